//! # erg-core
//! Foundation types and primitives for ergvault: the box value model, ids,
//! addresses, asset aggregation, transaction assembly and signing.

pub mod address;
pub mod assembly;
pub mod assets;
pub mod constants;
pub mod crypto;
pub mod ergo;
pub mod error;
pub mod prover;
pub mod types;

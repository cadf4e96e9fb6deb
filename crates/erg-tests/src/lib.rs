//! Cross-crate test suite for ergvault.
//!
//! Drives the drafter, sign request, signer and connector together over
//! wallets derived from fixed seeds, and checks value and token
//! conservation with property tests.

pub mod helpers;

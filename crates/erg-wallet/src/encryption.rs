//! AES-256-GCM encryption of key material.
//!
//! The encryption key is derived from the password with Argon2id (default
//! parameters) over a random per-file salt.
//!
//! # Wire format
//! ```text
//! salt (32 bytes) || nonce (12 bytes) || ciphertext + auth_tag
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Minimum encrypted payload size (salt + nonce + auth tag).
const MIN_ENCRYPTED_LEN: usize = SALT_LEN + NONCE_LEN + 16;

/// Derive a 256-bit encryption key from a password and salt using Argon2id.
pub fn derive_key(password: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| WalletError::Encryption(format!("key derivation: {e}")))?;
    Ok(key)
}

/// Encrypt plaintext with a password using AES-256-GCM.
///
/// Generates a random 32-byte salt and 12-byte nonce. Returns
/// `salt || nonce || ciphertext+tag`.
pub fn encrypt(plaintext: &[u8], password: &[u8]) -> Result<Vec<u8>, WalletError> {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut result = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    result.extend_from_slice(&salt);
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt data produced by [`encrypt`].
///
/// A wrong password and a tampered payload are indistinguishable and both
/// yield [`WalletError::InvalidPassword`].
pub fn decrypt(encrypted: &[u8], password: &[u8]) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    if encrypted.len() < MIN_ENCRYPTED_LEN {
        return Err(WalletError::CorruptedData(format!(
            "encrypted data too short: {} < {MIN_ENCRYPTED_LEN}",
            encrypted.len()
        )));
    }

    let (salt, rest) = encrypted.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| WalletError::Decryption(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| WalletError::InvalidPassword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let password = b"correct horse battery staple";
        let plaintext = b"root key bytes";

        let encrypted = encrypt(plaintext, password).unwrap();
        let decrypted = decrypt(&encrypted, password).unwrap();
        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn empty_plaintext() {
        let encrypted = encrypt(b"", b"password").unwrap();
        assert!(decrypt(&encrypted, b"password").unwrap().is_empty());
    }

    #[test]
    fn wrong_password_fails() {
        let encrypted = encrypt(b"secret", b"correct").unwrap();
        assert_eq!(
            decrypt(&encrypted, b"wrong").unwrap_err(),
            WalletError::InvalidPassword
        );
    }

    #[test]
    fn truncated_data_fails() {
        let err = decrypt(&[0u8; 10], b"password").unwrap_err();
        assert!(matches!(err, WalletError::CorruptedData(_)));
    }

    #[test]
    fn tampering_fails() {
        let encrypted = encrypt(b"secret data", b"password").unwrap();
        for pos in [0, SALT_LEN, encrypted.len() - 1] {
            let mut tampered = encrypted.clone();
            tampered[pos] ^= 0xFF;
            assert_eq!(
                decrypt(&tampered, b"password").unwrap_err(),
                WalletError::InvalidPassword,
                "byte {pos}"
            );
        }
    }

    #[test]
    fn derive_key_depends_on_inputs() {
        let salt = [1u8; SALT_LEN];
        let k1 = derive_key(b"password", &salt).unwrap();
        let k2 = derive_key(b"password", &salt).unwrap();
        let k3 = derive_key(b"password2", &salt).unwrap();
        let k4 = derive_key(b"password", &[2u8; SALT_LEN]).unwrap();
        assert_eq!(*k1, *k2);
        assert_ne!(*k1, *k3);
        assert_ne!(*k1, *k4);
    }

    #[test]
    fn encrypted_has_correct_overhead() {
        let plaintext = b"hello";
        let encrypted = encrypt(plaintext, b"password").unwrap();
        assert_eq!(encrypted.len(), SALT_LEN + NONCE_LEN + plaintext.len() + 16);
    }
}

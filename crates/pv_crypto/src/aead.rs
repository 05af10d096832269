//! Vault encryption layer
//!
//! AES-256-GCM with a random 12-byte nonce per encryption.
//!
//! Persisted blob format (load-bearing, exact):
//!   `base64(nonce) ":" base64(ciphertext || tag)`
//!
//! Plaintext is arbitrary UTF-8 — often itself a serialized JSON blob.
//! Anything that is not exactly two base64 segments is a format error;
//! a tag-check failure is an authentication error, never garbage output.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;

const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under a 32-byte key into the `b64(nonce):b64(ct)`
/// wire format.
pub fn encrypt(key: &[u8; 32], plaintext: &str) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::Authentication)?;

    Ok(format!(
        "{}:{}",
        STANDARD.encode(nonce_bytes),
        STANDARD.encode(&ciphertext)
    ))
}

/// Decrypt a `b64(nonce):b64(ct)` blob. The plaintext is wrapped in
/// `Zeroizing` so intermediate copies are wiped once dropped.
pub fn decrypt(key: &[u8; 32], blob: &str) -> Result<Zeroizing<String>, CryptoError> {
    let parts: Vec<&str> = blob.split(':').collect();
    if parts.len() != 2 {
        return Err(CryptoError::BlobFormat);
    }

    let nonce_bytes = STANDARD.decode(parts[0]).map_err(|_| CryptoError::BlobFormat)?;
    let ciphertext = STANDARD.decode(parts[1]).map_err(|_| CryptoError::BlobFormat)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(CryptoError::BlobFormat);
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext.as_slice())
        .map_err(|_| CryptoError::Authentication)?;

    let text = String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)?;
    Ok(Zeroizing::new(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn round_trip() {
        let k = key(1);
        for msg in ["hello", "", "colon:inside:everywhere", "ünïcødé ✓", "{\"a\":1}"] {
            let blob = encrypt(&k, msg).unwrap();
            let out = decrypt(&k, &blob).unwrap();
            assert_eq!(out.as_str(), msg);
        }
    }

    #[test]
    fn nonce_is_fresh_per_encryption() {
        let k = key(1);
        let a = encrypt(&k, "same plaintext").unwrap();
        let b = encrypt(&k, "same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_is_authentication_failure() {
        let blob = encrypt(&key(1), "secret").unwrap();
        let err = decrypt(&key(2), &blob).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn tampered_ciphertext_is_authentication_failure() {
        let k = key(1);
        let blob = encrypt(&k, "secret").unwrap();
        let (nonce_b64, _) = blob.split_once(':').unwrap();
        let forged = format!("{nonce_b64}:{}", STANDARD.encode([0u8; 32]));
        assert!(matches!(
            decrypt(&k, &forged).unwrap_err(),
            CryptoError::Authentication
        ));
    }

    #[test]
    fn malformed_blobs_are_format_errors() {
        let k = key(1);
        for blob in ["no-colon", "a:b:c", ":", "!!!:###", ""] {
            assert!(
                matches!(decrypt(&k, blob).unwrap_err(), CryptoError::BlobFormat),
                "expected BlobFormat for {blob:?}"
            );
        }
    }

    #[test]
    fn short_nonce_is_format_error() {
        let k = key(1);
        let blob = format!("{}:{}", STANDARD.encode([0u8; 4]), STANDARD.encode([0u8; 20]));
        assert!(matches!(
            decrypt(&k, &blob).unwrap_err(),
            CryptoError::BlobFormat
        ));
    }
}

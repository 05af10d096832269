use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid encrypted data format")]
    BlobFormat,

    #[error("AEAD decryption failed (authentication tag mismatch — possible tampering)")]
    Authentication,

    #[error("Key agreement failed: {0}")]
    KeyAgreement(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Decrypted data is not valid UTF-8")]
    Utf8,
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("An account with this email address already exists")]
    EmailTaken,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] pv_crypto::CryptoError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

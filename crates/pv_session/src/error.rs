//! Session error taxonomy.
//!
//! The interface layer only ever sees `user_message()` — a small enumerated
//! set of strings. Raw cryptographic failure detail and key material stay
//! below this boundary.

use pv_crypto::CryptoError;
use pv_store::StoreError;
use thiserror::Error;

/// Why a remote credential check did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialFailure {
    WrongCredential,
    OtherFailure(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The remote store rejected the email/password pair.
    #[error("credential check failed")]
    Credential(CredentialFailure),

    /// The remote credential was accepted but the vault would not decrypt —
    /// the password was changed out of band.
    #[error("vault decryption failed with the supplied password")]
    InvalidPassword,

    /// Operation requires an unlocked real vault.
    #[error("vault is locked")]
    VaultLocked,

    /// `change_password` was given a wrong current password.
    #[error("current password is incorrect")]
    CurrentPasswordIncorrect,

    #[error("username is already taken")]
    UsernameTaken,

    /// The remote password changed but the re-encrypted vault could not be
    /// confirmed persisted. The session keeps the previous master key.
    #[error("vault persistence could not be confirmed after password change: {0}")]
    Critical(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

impl SessionError {
    /// Map to the fixed set of user-visible messages.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::Credential(CredentialFailure::WrongCredential) => {
                "Invalid email or password. Please try again."
            }
            SessionError::InvalidPassword => "Invalid password. Vault decryption failed.",
            SessionError::VaultLocked => "Vault is locked.",
            SessionError::CurrentPasswordIncorrect => {
                "The current password you entered is incorrect."
            }
            SessionError::UsernameTaken => {
                "This username is already taken. Please choose another."
            }
            SessionError::Store(StoreError::EmailTaken) => {
                "An account with this email address already exists."
            }
            SessionError::Critical(_) => {
                "Your password was changed, but the vault update could not be confirmed. \
                 Do not change it again before signing back in."
            }
            _ => "An unknown error occurred. Please try again.",
        }
    }
}

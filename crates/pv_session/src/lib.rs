//! pv_session — Photon Vault session lifecycle
//!
//! One [`Session`] per client process. It owns the locked / unlocked-real /
//! unlocked-decoy state machine, the in-memory session vault, the duress
//! fallback, per-conversation secret negotiation and the message cipher.
//!
//! # Module layout
//! - `session` — the state machine and lifecycle operations
//! - `vault`   — in-memory decrypted vault + seal/open helpers
//! - `watch`   — per-conversation subscription handling
//! - `error`   — session error taxonomy + user-facing message mapping

pub mod error;
pub mod session;
pub mod vault;
pub mod watch;

pub use error::{CredentialFailure, SessionError};
pub use session::{Session, SessionProfile};
pub use vault::ChatKey;

/// Shown in place of a message body that could not be decrypted.
pub const DECRYPTION_FAILED_PLACEHOLDER: &str = "[DECRYPTION FAILED]";

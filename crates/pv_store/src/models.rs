//! Document models — these map to/from remote store records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The plaintext structure inside `VaultRecord::encrypted_shared_secrets`:
/// chat id → base64 shared secret. Serialized as JSON before encryption.
pub type SharedSecretsMap = BTreeMap<String, String>;

/// Account identity, owned by the remote store. Immutable after creation
/// except for `duress_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub uid: String,
    pub username: String,
    /// Uppercased username, used for uniqueness checks and lookups.
    pub username_normalized: String,
    /// Lowercased email.
    pub email: String,
    /// Base64 ML-KEM-1024 public key.
    pub kem_public_key: String,
    pub created_at: DateTime<Utc>,
    /// Base64 duress-password hash, if the account enrolled one.
    pub duress_hash: Option<String>,
}

/// The encrypted key vault, one per account. Both fields are opaque
/// `b64(nonce):b64(ct)` blobs; the store never sees plaintext key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub encrypted_private_key: String,
    pub encrypted_shared_secrets: String,
}

/// Transient handshake payload attached to a conversation record. Created
/// at conversation initiation, cleared once the recipient decapsulates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingKeyEncap {
    pub recipient_id: String,
    /// Base64 ML-KEM-1024 ciphertext.
    pub ciphertext: String,
}

/// The slice of a conversation record the vault core cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    /// The two participant uids.
    pub users: [String; 2],
    pub pending_key_encap: Option<PendingKeyEncap>,
}

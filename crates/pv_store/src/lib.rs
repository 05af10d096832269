//! pv_store — remote document store abstraction for Photon Vault
//!
//! The vault core never talks to a concrete backend directly. Everything
//! goes through the [`RemoteStore`] trait: account records, vault records
//! (two opaque encrypted blobs), pending key encapsulations on conversation
//! records, and cancellable conversation subscriptions.
//!
//! The credential check is a closed [`CredentialOutcome`] enum — backends
//! must map their own error codes into it, because only the specific
//! `WrongCredential` outcome may ever trigger the duress fallback.
//!
//! `memory` provides an in-process backend used by tests and local runs.

pub mod error;
pub mod memory;
pub mod models;
pub mod remote;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use models::{AccountRecord, ChatRecord, PendingKeyEncap, SharedSecretsMap, VaultRecord};
pub use remote::{ChatSubscription, CredentialOutcome, RemoteStore};

//! The remote store contract consumed by the session layer.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::models::{AccountRecord, ChatRecord, PendingKeyEncap, VaultRecord};

/// Outcome of a remote credential check.
///
/// Deliberately a closed enum rather than a passthrough of backend error
/// codes: only `WrongCredential` may trigger the duress fallback, so the
/// backend must commit to one of exactly three meanings. Network failures,
/// rate limits and everything else are `OtherFailure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOutcome {
    Success { uid: String },
    WrongCredential,
    OtherFailure(String),
}

/// Cancellable stream of conversation-record updates.
///
/// The first item is a snapshot of the record at subscription time; every
/// subsequent item is a post-mutation state. Dropping the subscription
/// cancels it — the backend prunes the dead channel on its next send.
pub struct ChatSubscription {
    pub(crate) rx: mpsc::UnboundedReceiver<ChatRecord>,
}

impl ChatSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<ChatRecord>) -> Self {
        Self { rx }
    }

    /// Next record update, or `None` once the backend side is gone.
    pub async fn next(&mut self) -> Option<ChatRecord> {
        self.rx.recv().await
    }
}

/// Remote document store, as consumed by the vault core.
///
/// Vault records are replaced wholesale (last-writer-wins, never partial),
/// so an interrupted write cannot leave a half-updated record. Uniqueness
/// of usernames/emails is enforced by the caller before writes; the finders
/// return zero-or-one match.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // ── Credentials ─────────────────────────────────────────────────────

    async fn check_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CredentialOutcome, StoreError>;

    /// Register a credential; returns the new uid.
    async fn create_credential(&self, email: &str, password: &str) -> Result<String, StoreError>;

    async fn update_password(&self, uid: &str, new_password: &str) -> Result<(), StoreError>;

    // ── Accounts ────────────────────────────────────────────────────────

    async fn get_account(&self, uid: &str) -> Result<AccountRecord, StoreError>;

    async fn find_account_by_username(
        &self,
        username_normalized: &str,
    ) -> Result<Option<AccountRecord>, StoreError>;

    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountRecord>, StoreError>;

    async fn put_account(&self, account: AccountRecord) -> Result<(), StoreError>;

    /// Replace the account's duress hash — the only account field that is
    /// mutable after creation. `None` clears enrollment.
    async fn set_duress_hash(
        &self,
        uid: &str,
        duress_hash: Option<String>,
    ) -> Result<(), StoreError>;

    // ── Vault records ───────────────────────────────────────────────────

    async fn get_vault_record(&self, uid: &str) -> Result<VaultRecord, StoreError>;

    async fn put_vault_record(&self, uid: &str, record: VaultRecord) -> Result<(), StoreError>;

    // ── Conversations ───────────────────────────────────────────────────

    async fn create_chat(&self, chat: ChatRecord) -> Result<(), StoreError>;

    async fn get_chat(&self, chat_id: &str) -> Result<ChatRecord, StoreError>;

    async fn set_pending_key_encap(
        &self,
        chat_id: &str,
        pending: PendingKeyEncap,
    ) -> Result<(), StoreError>;

    /// Clearing an already-clear payload is a no-op, not an error.
    async fn clear_pending_key_encap(&self, chat_id: &str) -> Result<(), StoreError>;

    async fn subscribe(&self, chat_id: &str) -> Result<ChatSubscription, StoreError>;
}

//! In-process store backend.
//!
//! Stands in for the hosted document store during tests and local runs.
//! Credentials are kept as SHA-256 digests (this is a test double, not an
//! auth server — the real backend does its own password handling).
//!
//! Fault hooks: `fail_next_vault_write` / `fail_next_password_update` make
//! exactly one subsequent write fail, so tests can drive the
//! password-change inconsistency path.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{AccountRecord, ChatRecord, PendingKeyEncap, VaultRecord};
use crate::remote::{ChatSubscription, CredentialOutcome, RemoteStore};

struct CredentialEntry {
    uid: String,
    password_digest: [u8; 32],
}

#[derive(Default)]
struct MemoryInner {
    /// email (lowercased) → credential
    credentials: HashMap<String, CredentialEntry>,
    accounts: HashMap<String, AccountRecord>,
    vaults: HashMap<String, VaultRecord>,
    chats: HashMap<String, ChatRecord>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<ChatRecord>>>,
    fail_next_vault_write: bool,
    fail_next_password_update: bool,
    fail_next_credential_check: bool,
}

/// Cheap-clone handle; all clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

fn digest_password(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `put_vault_record` fail.
    pub async fn fail_next_vault_write(&self) {
        self.inner.write().await.fail_next_vault_write = true;
    }

    /// Make the next `update_password` fail.
    pub async fn fail_next_password_update(&self) {
        self.inner.write().await.fail_next_password_update = true;
    }

    /// Make the next `check_credential` report `OtherFailure` — a network
    /// or backend error, not a credential verdict.
    pub async fn fail_next_credential_check(&self) {
        self.inner.write().await.fail_next_credential_check = true;
    }

    /// Fan a chat record out to live subscribers, pruning dead channels.
    fn notify(inner: &mut MemoryInner, chat: &ChatRecord) {
        if let Some(senders) = inner.watchers.get_mut(&chat.id) {
            senders.retain(|tx| tx.send(chat.clone()).is_ok());
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn check_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CredentialOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.fail_next_credential_check {
            inner.fail_next_credential_check = false;
            return Ok(CredentialOutcome::OtherFailure(
                "injected credential-check fault".into(),
            ));
        }
        // Unknown email and bad password both report WrongCredential, the
        // way hosted auth providers fold them into one code.
        match inner.credentials.get(&email.to_lowercase()) {
            Some(entry) if entry.password_digest == digest_password(password) => {
                Ok(CredentialOutcome::Success {
                    uid: entry.uid.clone(),
                })
            }
            _ => Ok(CredentialOutcome::WrongCredential),
        }
    }

    async fn create_credential(&self, email: &str, password: &str) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        let email = email.to_lowercase();
        if inner.credentials.contains_key(&email) {
            return Err(StoreError::EmailTaken);
        }
        let uid = Uuid::new_v4().to_string();
        inner.credentials.insert(
            email,
            CredentialEntry {
                uid: uid.clone(),
                password_digest: digest_password(password),
            },
        );
        Ok(uid)
    }

    async fn update_password(&self, uid: &str, new_password: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.fail_next_password_update {
            inner.fail_next_password_update = false;
            return Err(StoreError::Backend("injected password-update fault".into()));
        }
        let entry = inner
            .credentials
            .values_mut()
            .find(|entry| entry.uid == uid)
            .ok_or_else(|| StoreError::NotFound(format!("credential for uid {uid}")))?;
        entry.password_digest = digest_password(new_password);
        Ok(())
    }

    async fn get_account(&self, uid: &str) -> Result<AccountRecord, StoreError> {
        self.inner
            .read()
            .await
            .accounts
            .get(uid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("account {uid}")))
    }

    async fn find_account_by_username(
        &self,
        username_normalized: &str,
    ) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.username_normalized == username_normalized)
            .cloned())
    }

    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let email = email.to_lowercase();
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn put_account(&self, account: AccountRecord) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .accounts
            .insert(account.uid.clone(), account);
        Ok(())
    }

    async fn set_duress_hash(
        &self,
        uid: &str,
        duress_hash: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(uid)
            .ok_or_else(|| StoreError::NotFound(format!("account {uid}")))?;
        account.duress_hash = duress_hash;
        Ok(())
    }

    async fn get_vault_record(&self, uid: &str) -> Result<VaultRecord, StoreError> {
        self.inner
            .read()
            .await
            .vaults
            .get(uid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("key vault {uid}")))
    }

    async fn put_vault_record(&self, uid: &str, record: VaultRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.fail_next_vault_write {
            inner.fail_next_vault_write = false;
            return Err(StoreError::Backend("injected vault-write fault".into()));
        }
        // Whole-record replace, last writer wins.
        inner.vaults.insert(uid.to_string(), record);
        Ok(())
    }

    async fn create_chat(&self, chat: ChatRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let snapshot = chat.clone();
        inner.chats.insert(chat.id.clone(), chat);
        Self::notify(&mut inner, &snapshot);
        Ok(())
    }

    async fn get_chat(&self, chat_id: &str) -> Result<ChatRecord, StoreError> {
        self.inner
            .read()
            .await
            .chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("chat {chat_id}")))
    }

    async fn set_pending_key_encap(
        &self,
        chat_id: &str,
        pending: PendingKeyEncap,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let chat = inner
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| StoreError::NotFound(format!("chat {chat_id}")))?;
        chat.pending_key_encap = Some(pending);
        let snapshot = chat.clone();
        Self::notify(&mut inner, &snapshot);
        Ok(())
    }

    async fn clear_pending_key_encap(&self, chat_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let Some(chat) = inner.chats.get_mut(chat_id) else {
            return Ok(());
        };
        if chat.pending_key_encap.take().is_none() {
            return Ok(());
        }
        debug!(chat_id, "pending key encapsulation cleared");
        let snapshot = chat.clone();
        Self::notify(&mut inner, &snapshot);
        Ok(())
    }

    async fn subscribe(&self, chat_id: &str) -> Result<ChatSubscription, StoreError> {
        let mut inner = self.inner.write().await;
        let snapshot = inner
            .chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("chat {chat_id}")))?;
        let (tx, rx) = mpsc::unbounded_channel();
        // Initial snapshot first, then every mutation.
        let _ = tx.send(snapshot);
        inner
            .watchers
            .entry(chat_id.to_string())
            .or_default()
            .push(tx);
        Ok(ChatSubscription::new(rx))
    }
}

//! Conversation watchers.
//!
//! One subscription per open conversation, at most. Each watcher task
//! consumes pending key encapsulations addressed to the local identity:
//! decapsulate, persist, clear. Consumption therefore happens-before any
//! message-key resolution for that conversation — the key cannot exist
//! until the decapsulation completed.
//!
//! Handles are cancelled on `unwatch_chat` and on logout, so a stale chat
//! id can never trigger a decapsulation after teardown.

use pv_store::RemoteStore;
use tracing::warn;

use crate::error::SessionError;
use crate::session::{Session, SessionState};

impl<S: RemoteStore + 'static> Session<S> {
    /// Start watching a conversation. Requires an unlocked real vault.
    /// Watching an already-watched chat is a no-op.
    pub async fn watch_chat(&self, chat_id: &str) -> Result<(), SessionError> {
        let uid = match &*self.state.read().await {
            SessionState::UnlockedReal { profile, .. } => profile.uid.clone(),
            _ => return Err(SessionError::VaultLocked),
        };

        if self.watchers.lock().contains_key(chat_id) {
            return Ok(());
        }

        let mut subscription = self.store.subscribe(chat_id).await?;
        let session = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(record) = subscription.next().await {
                let Some(pending) = record.pending_key_encap else {
                    continue;
                };
                if pending.recipient_id != uid {
                    continue;
                }
                if let Err(err) = session
                    .decap_and_save_key(&record.id, &pending.ciphertext)
                    .await
                {
                    warn!(chat_id = %record.id, %err, "failed to consume pending key encapsulation");
                }
            }
        });

        let mut watchers = self.watchers.lock();
        if watchers.contains_key(chat_id) {
            // Lost a registration race; keep the existing watcher.
            handle.abort();
        } else {
            watchers.insert(chat_id.to_string(), handle);
        }
        Ok(())
    }

    /// Stop watching a conversation.
    pub fn unwatch_chat(&self, chat_id: &str) {
        if let Some(handle) = self.watchers.lock().remove(chat_id) {
            handle.abort();
        }
    }
}

impl<S> Session<S> {
    pub(crate) fn cancel_all_watchers(&self) {
        for (_, handle) in self.watchers.lock().drain() {
            handle.abort();
        }
    }
}

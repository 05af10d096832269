//! Vault lifecycle state machine.
//!
//! States: `Locked`, `UnlockedReal` (master key + decrypted vault in
//! memory), `UnlockedDecoy` (identity loaded, NO vault, NO master key).
//! The transient `Unlocking` state of the design is the await inside
//! `login`; a failed unlock surfaces as the returned error.
//!
//! Only `UnlockedReal` permits secret negotiation and message-key
//! operations. A decoy session answers "vault locked" to all of them even
//! though its profile looks fully authenticated.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pv_crypto::aead;
use pv_crypto::kdf::{derive_master_key, duress_matches, hash_duress, salt_for_email};
use pv_crypto::kem::{KemCiphertext, KemKeyPair, KemPublicKey};
use pv_store::{
    AccountRecord, CredentialOutcome, PendingKeyEncap, RemoteStore, SharedSecretsMap,
};

use crate::error::{CredentialFailure, SessionError};
use crate::vault::{ChatKey, SessionVault};
use crate::DECRYPTION_FAILED_PLACEHOLDER;

/// Identity fields exposed to the UI. A decoy session carries exactly
/// these and nothing else, with `verified` forced true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    pub uid: String,
    pub email: String,
    pub username: String,
    pub verified: bool,
}

pub(crate) enum SessionState {
    Locked,
    UnlockedReal {
        profile: SessionProfile,
        vault: SessionVault,
    },
    UnlockedDecoy {
        profile: SessionProfile,
    },
}

/// The one session handle of a client process. Cheap to clone; all clones
/// share state.
pub struct Session<S> {
    pub(crate) store: Arc<S>,
    pub(crate) state: Arc<RwLock<SessionState>>,
    pub(crate) watchers: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl<S> Clone for Session<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            watchers: Arc::clone(&self.watchers),
        }
    }
}

impl<S: RemoteStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            state: Arc::new(RwLock::new(SessionState::Locked)),
            watchers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Log in. On a `WrongCredential` outcome exactly one duress-fallback
    /// attempt is made; any other failure surfaces unchanged and never
    /// offers the decoy path.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let email = email.to_lowercase();
        match self.store.check_credential(&email, password).await? {
            CredentialOutcome::Success { uid } => self.unlock_real(&uid, password).await,
            CredentialOutcome::WrongCredential => self.try_duress(&email, password).await,
            CredentialOutcome::OtherFailure(msg) => Err(SessionError::Credential(
                CredentialFailure::OtherFailure(msg),
            )),
        }
    }

    async fn unlock_real(&self, uid: &str, password: &str) -> Result<(), SessionError> {
        let account = self.store.get_account(uid).await?;
        let record = self.store.get_vault_record(uid).await?;

        let salt = salt_for_email(&account.email);
        let master_key = derive_master_key(password, &salt);

        let vault = match SessionVault::open(master_key, &record) {
            Ok(vault) => vault,
            Err(_) => {
                // Credential accepted but vault will not decrypt: the
                // password was changed outside this app. Force logout.
                warn!(uid, "vault decryption failed after credential success");
                self.logout().await;
                return Err(SessionError::InvalidPassword);
            }
        };

        info!(uid, "vault unlocked");
        *self.state.write().await = SessionState::UnlockedReal {
            profile: profile_of(&account),
            vault,
        };
        Ok(())
    }

    async fn try_duress(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let wrong = || SessionError::Credential(CredentialFailure::WrongCredential);

        let Some(account) = self.store.find_account_by_email(email).await? else {
            return Err(wrong());
        };
        let Some(stored_hash) = &account.duress_hash else {
            return Err(wrong());
        };
        if !duress_matches(stored_hash, password) {
            return Err(wrong());
        }

        info!(uid = %account.uid, "duress credential matched; decoy session active");
        *self.state.write().await = SessionState::UnlockedDecoy {
            profile: profile_of(&account),
        };
        Ok(())
    }

    /// Create an account: credential, KEM keypair, encrypted vault with an
    /// empty secrets map, optional duress hash. Unlocks directly.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        username: &str,
        duress_password: Option<&str>,
    ) -> Result<(), SessionError> {
        let username_normalized = username.to_uppercase();
        if self
            .store
            .find_account_by_username(&username_normalized)
            .await?
            .is_some()
        {
            return Err(SessionError::UsernameTaken);
        }

        let email = email.to_lowercase();
        let uid = self.store.create_credential(&email, password).await?;

        let keypair = KemKeyPair::generate();
        let salt = salt_for_email(&email);
        let vault = SessionVault {
            master_key: derive_master_key(password, &salt),
            kem_private_key: keypair.private,
            shared_secrets: SharedSecretsMap::new(),
        };
        let record = vault.seal()?;

        let account = AccountRecord {
            uid: uid.clone(),
            username: username.to_string(),
            username_normalized,
            email,
            kem_public_key: keypair.public.to_b64(),
            created_at: Utc::now(),
            duress_hash: duress_password.map(hash_duress),
        };
        self.store.put_account(account.clone()).await?;
        self.store.put_vault_record(&uid, record).await?;

        info!(uid, "account created; vault unlocked");
        *self.state.write().await = SessionState::UnlockedReal {
            profile: profile_of(&account),
            vault,
        };
        Ok(())
    }

    /// Tear down the session: cancel chat watchers, wipe the vault,
    /// return to `Locked`. Idempotent.
    pub async fn logout(&self) {
        self.cancel_all_watchers();
        let mut state = self.state.write().await;
        if !matches!(*state, SessionState::Locked) {
            info!("session locked");
        }
        *state = SessionState::Locked;
    }

    /// Change the account password and re-encrypt the vault under the new
    /// master key.
    ///
    /// Order matters: the remote password is updated first, then the vault
    /// record. If the vault write fails after the password already changed,
    /// the two are inconsistent — that is a `Critical` error, and the
    /// session keeps the OLD master key rather than adopting an unverified
    /// new one.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), SessionError> {
        let mut state = self.state.write().await;
        let SessionState::UnlockedReal { profile, vault } = &mut *state else {
            return Err(SessionError::VaultLocked);
        };

        match self.store.check_credential(&profile.email, current).await? {
            CredentialOutcome::Success { .. } => {}
            CredentialOutcome::WrongCredential => {
                return Err(SessionError::CurrentPasswordIncorrect)
            }
            CredentialOutcome::OtherFailure(msg) => {
                return Err(SessionError::Credential(CredentialFailure::OtherFailure(
                    msg,
                )))
            }
        }

        let salt = salt_for_email(&profile.email);
        let new_key = derive_master_key(new, &salt);
        let record = vault.seal_with(&new_key)?;

        self.store.update_password(&profile.uid, new).await?;
        if let Err(err) = self.store.put_vault_record(&profile.uid, record).await {
            error!(uid = %profile.uid, "vault write failed after password change");
            return Err(SessionError::Critical(err.to_string()));
        }

        vault.master_key = new_key;
        info!(uid = %profile.uid, "password changed; vault re-encrypted");
        Ok(())
    }

    /// Enroll, replace, or clear (`None`) the duress password. Requires a
    /// real unlocked session — a decoy session must not be able to learn
    /// that the feature exists, let alone rotate the hash.
    pub async fn set_duress_password(
        &self,
        duress_password: Option<&str>,
    ) -> Result<(), SessionError> {
        let state = self.state.read().await;
        let SessionState::UnlockedReal { profile, .. } = &*state else {
            return Err(SessionError::VaultLocked);
        };

        self.store
            .set_duress_hash(&profile.uid, duress_password.map(hash_duress))
            .await?;
        info!(uid = %profile.uid, "duress enrollment updated");
        Ok(())
    }

    // ── Flags & profile ─────────────────────────────────────────────────

    /// True only for a real unlocked session — a decoy session reports
    /// false despite its populated profile.
    pub async fn is_vault_unlocked(&self) -> bool {
        matches!(*self.state.read().await, SessionState::UnlockedReal { .. })
    }

    pub async fn is_decoy_mode(&self) -> bool {
        matches!(*self.state.read().await, SessionState::UnlockedDecoy { .. })
    }

    pub async fn profile(&self) -> Option<SessionProfile> {
        match &*self.state.read().await {
            SessionState::Locked => None,
            SessionState::UnlockedReal { profile, .. }
            | SessionState::UnlockedDecoy { profile } => Some(profile.clone()),
        }
    }

    // ── Secret negotiation ──────────────────────────────────────────────

    /// Initiate a conversation: encapsulate against the recipient's public
    /// key, store the secret, persist the re-encrypted vault, publish the
    /// ciphertext as the pending payload. Returns the ciphertext (base64).
    pub async fn encap_and_save_key(
        &self,
        chat_id: &str,
        recipient_id: &str,
        recipient_public_key_b64: &str,
    ) -> Result<String, SessionError> {
        let mut state = self.state.write().await;
        let SessionState::UnlockedReal { profile, vault } = &mut *state else {
            return Err(SessionError::VaultLocked);
        };

        let peer_key = KemPublicKey::from_b64(recipient_public_key_b64)?;
        let (secret, ciphertext) = peer_key.encapsulate()?;

        vault
            .shared_secrets
            .insert(chat_id.to_string(), secret.to_b64());
        let record = vault.seal()?;
        if let Err(err) = self.store.put_vault_record(&profile.uid, record).await {
            vault.shared_secrets.remove(chat_id);
            return Err(err.into());
        }

        let ciphertext_b64 = ciphertext.to_b64();
        self.store
            .set_pending_key_encap(
                chat_id,
                PendingKeyEncap {
                    recipient_id: recipient_id.to_string(),
                    ciphertext: ciphertext_b64.clone(),
                },
            )
            .await?;

        info!(chat_id, "chat secret negotiated (initiator)");
        Ok(ciphertext_b64)
    }

    /// Consume a pending payload: decapsulate, store the secret, persist,
    /// clear the payload. At-most-once — if this chat already has a secret
    /// the call is a no-op, so a repeat against an already-cleared payload
    /// changes nothing and raises nothing.
    pub async fn decap_and_save_key(
        &self,
        chat_id: &str,
        ciphertext_b64: &str,
    ) -> Result<(), SessionError> {
        let mut state = self.state.write().await;
        let SessionState::UnlockedReal { profile, vault } = &mut *state else {
            return Err(SessionError::VaultLocked);
        };

        if vault.shared_secrets.contains_key(chat_id) {
            return Ok(());
        }

        let ciphertext = KemCiphertext::from_b64(ciphertext_b64)?;
        let secret = vault.kem_private_key.decapsulate(&ciphertext)?;

        vault
            .shared_secrets
            .insert(chat_id.to_string(), secret.to_b64());
        let record = vault.seal()?;
        if let Err(err) = self.store.put_vault_record(&profile.uid, record).await {
            vault.shared_secrets.remove(chat_id);
            return Err(err.into());
        }

        self.store.clear_pending_key_encap(chat_id).await?;
        info!(chat_id, "chat secret negotiated (recipient)");
        Ok(())
    }

    // ── Message cipher ──────────────────────────────────────────────────

    /// The per-chat cipher key, or `None` when the vault is locked (or
    /// decoy) or the chat has no negotiated secret.
    pub async fn get_chat_key(&self, chat_id: &str) -> Option<ChatKey> {
        match &*self.state.read().await {
            SessionState::UnlockedReal { vault, .. } => vault.chat_key(chat_id),
            _ => None,
        }
    }

    pub async fn encrypt_message(
        &self,
        chat_id: &str,
        text: &str,
    ) -> Result<String, SessionError> {
        let key = self
            .get_chat_key(chat_id)
            .await
            .ok_or(SessionError::VaultLocked)?;
        Ok(aead::encrypt(key.as_bytes(), text)?)
    }

    /// Decrypt a message body for display. Per-message degradation: a
    /// missing key or corrupted payload yields the placeholder, never an
    /// error — one bad message must not take down the conversation view.
    pub async fn decrypt_message(&self, chat_id: &str, blob: &str) -> String {
        let Some(key) = self.get_chat_key(chat_id).await else {
            return DECRYPTION_FAILED_PLACEHOLDER.to_string();
        };
        match aead::decrypt(key.as_bytes(), blob) {
            Ok(plaintext) => plaintext.to_string(),
            Err(_) => {
                warn!(chat_id, "message decryption failed");
                DECRYPTION_FAILED_PLACEHOLDER.to_string()
            }
        }
    }
}

fn profile_of(account: &AccountRecord) -> SessionProfile {
    SessionProfile {
        uid: account.uid.clone(),
        email: account.email.clone(),
        username: account.username.clone(),
        verified: true,
    }
}

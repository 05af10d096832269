//! The in-memory session vault.
//!
//! Exists only between a successful unlock and logout. The master key and
//! private KEM key zeroize themselves on drop; the shared-secrets map is
//! wiped by an explicit `Drop` impl. Nothing here is ever persisted in
//! plaintext — persistence goes through `seal_with`, which produces the two
//! opaque blobs of a [`VaultRecord`].

use pv_crypto::aead;
use pv_crypto::kdf::MasterKey;
use pv_crypto::kem::{KemPrivateKey, SharedSecret, KEM_SHARED_SECRET_SIZE};
use pv_store::{SharedSecretsMap, VaultRecord};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SessionError;

/// A per-conversation symmetric cipher key. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct ChatKey([u8; KEM_SHARED_SECRET_SIZE]);

impl ChatKey {
    pub fn as_bytes(&self) -> &[u8; KEM_SHARED_SECRET_SIZE] {
        &self.0
    }
}

#[derive(Debug)]
pub(crate) struct SessionVault {
    pub(crate) master_key: MasterKey,
    pub(crate) kem_private_key: KemPrivateKey,
    pub(crate) shared_secrets: SharedSecretsMap,
}

impl SessionVault {
    /// Decrypt a persisted vault record. Any failure here means the master
    /// key does not match the record — the caller decides policy.
    pub(crate) fn open(master_key: MasterKey, record: &VaultRecord) -> Result<Self, SessionError> {
        let private_key_b64 = aead::decrypt(master_key.as_bytes(), &record.encrypted_private_key)?;
        let kem_private_key = KemPrivateKey::from_b64(&private_key_b64)?;

        let secrets_json = aead::decrypt(master_key.as_bytes(), &record.encrypted_shared_secrets)?;
        let shared_secrets: SharedSecretsMap = serde_json::from_str(&secrets_json)?;

        Ok(Self {
            master_key,
            kem_private_key,
            shared_secrets,
        })
    }

    /// Re-encrypt the vault contents under `key` into a complete
    /// replacement record (never partial).
    pub(crate) fn seal_with(&self, key: &MasterKey) -> Result<VaultRecord, SessionError> {
        let encrypted_private_key = aead::encrypt(key.as_bytes(), &self.kem_private_key.to_b64())?;
        let secrets_json = serde_json::to_string(&self.shared_secrets)?;
        let encrypted_shared_secrets = aead::encrypt(key.as_bytes(), &secrets_json)?;
        Ok(VaultRecord {
            encrypted_private_key,
            encrypted_shared_secrets,
        })
    }

    pub(crate) fn seal(&self) -> Result<VaultRecord, SessionError> {
        self.seal_with(&self.master_key)
    }

    /// The chat secret imported as a symmetric cipher key, if present and
    /// well-formed.
    pub(crate) fn chat_key(&self, chat_id: &str) -> Option<ChatKey> {
        let secret_b64 = self.shared_secrets.get(chat_id)?;
        let secret = SharedSecret::from_b64(secret_b64).ok()?;
        Some(ChatKey(*secret.as_bytes()))
    }
}

impl Drop for SessionVault {
    fn drop(&mut self) {
        for secret in self.shared_secrets.values_mut() {
            secret.zeroize();
        }
    }
}

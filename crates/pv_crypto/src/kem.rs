//! KEM identity — ML-KEM-1024 key encapsulation
//!
//! Each account has one long-term ML-KEM-1024 keypair. The public key is
//! published on the account record; the private key only ever exists in
//! plaintext inside an unlocked session vault.
//!
//! `encapsulate` against a peer public key yields (shared secret,
//! ciphertext); the ciphertext is safe to publish, the shared secret is
//! symmetric key material. `decapsulate` with the matching private key
//! reproduces exactly the encapsulated secret.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pqcrypto_mlkem::mlkem1024;
use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// ML-KEM-1024 public key size in bytes.
pub const KEM_PUBLIC_KEY_SIZE: usize = 1568;
/// ML-KEM-1024 secret key size in bytes.
pub const KEM_SECRET_KEY_SIZE: usize = 3168;
/// ML-KEM-1024 ciphertext size in bytes.
pub const KEM_CIPHERTEXT_SIZE: usize = 1568;
/// Shared secret size in bytes.
pub const KEM_SHARED_SECRET_SIZE: usize = 32;

/// Public encapsulation key, base64-encoded on the account record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KemPublicKey(Vec<u8>);

/// Private decapsulation key. Zeroized on drop; lives only inside an
/// unlocked session vault.
#[derive(ZeroizeOnDrop)]
pub struct KemPrivateKey(Vec<u8>);

/// Encapsulation ciphertext — safe to publish on a conversation record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KemCiphertext(Vec<u8>);

/// 32-byte shared secret produced by encapsulate/decapsulate.
/// Zeroized on drop.
#[derive(ZeroizeOnDrop, PartialEq, Eq)]
pub struct SharedSecret([u8; KEM_SHARED_SECRET_SIZE]);

pub struct KemKeyPair {
    pub public: KemPublicKey,
    pub private: KemPrivateKey,
}

impl KemKeyPair {
    /// Generate a fresh ML-KEM-1024 keypair.
    pub fn generate() -> Self {
        let (pk, sk) = mlkem1024::keypair();
        Self {
            public: KemPublicKey(pk.as_bytes().to_vec()),
            private: KemPrivateKey(sk.as_bytes().to_vec()),
        }
    }
}

impl KemPublicKey {
    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| CryptoError::KeyAgreement(format!("public key: {e}")))?;
        // Validate eagerly so a malformed key fails here, not at encapsulation.
        mlkem1024::PublicKey::from_bytes(&bytes)
            .map_err(|_| CryptoError::KeyAgreement("malformed public key".into()))?;
        Ok(Self(bytes))
    }

    pub fn to_b64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Encapsulate against this public key.
    pub fn encapsulate(&self) -> Result<(SharedSecret, KemCiphertext), CryptoError> {
        let pk = mlkem1024::PublicKey::from_bytes(&self.0)
            .map_err(|_| CryptoError::KeyAgreement("malformed public key".into()))?;
        let (ss, ct) = mlkem1024::encapsulate(&pk);
        let mut secret = [0u8; KEM_SHARED_SECRET_SIZE];
        secret.copy_from_slice(ss.as_bytes());
        Ok((SharedSecret(secret), KemCiphertext(ct.as_bytes().to_vec())))
    }
}

impl KemPrivateKey {
    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = STANDARD
            .decode(s)
            .map_err(|e| CryptoError::KeyAgreement(format!("private key: {e}")))?;
        if mlkem1024::SecretKey::from_bytes(&bytes).is_err() {
            bytes.zeroize();
            return Err(CryptoError::KeyAgreement("malformed private key".into()));
        }
        Ok(Self(bytes))
    }

    pub fn to_b64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Decapsulate a ciphertext. Returns exactly the shared secret the
    /// matching `encapsulate` call produced.
    pub fn decapsulate(&self, ciphertext: &KemCiphertext) -> Result<SharedSecret, CryptoError> {
        let sk = mlkem1024::SecretKey::from_bytes(&self.0)
            .map_err(|_| CryptoError::KeyAgreement("malformed private key".into()))?;
        let ct = mlkem1024::Ciphertext::from_bytes(&ciphertext.0)
            .map_err(|_| CryptoError::KeyAgreement("malformed ciphertext".into()))?;
        let ss = mlkem1024::decapsulate(&ct, &sk);
        let mut secret = [0u8; KEM_SHARED_SECRET_SIZE];
        secret.copy_from_slice(ss.as_bytes());
        Ok(SharedSecret(secret))
    }
}

impl KemCiphertext {
    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| CryptoError::KeyAgreement(format!("ciphertext: {e}")))?;
        mlkem1024::Ciphertext::from_bytes(&bytes)
            .map_err(|_| CryptoError::KeyAgreement("malformed ciphertext".into()))?;
        Ok(Self(bytes))
    }

    pub fn to_b64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; KEM_SHARED_SECRET_SIZE] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| CryptoError::KeyAgreement(format!("shared secret: {e}")))?;
        if bytes.len() != KEM_SHARED_SECRET_SIZE {
            return Err(CryptoError::KeyAgreement("shared secret wrong length".into()));
        }
        let mut secret = [0u8; KEM_SHARED_SECRET_SIZE];
        secret.copy_from_slice(&bytes);
        Ok(Self(secret))
    }
}

impl std::fmt::Debug for KemPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KemPrivateKey(..)")
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

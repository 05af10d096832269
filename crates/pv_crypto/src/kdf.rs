//! Key derivation
//!
//! `derive_master_key` — PBKDF2-HMAC-SHA256, derives the 32-byte master key
//!   that wraps the key vault.
//!
//! `salt_for_email` — deterministic per-account salt: first 16 bytes of
//!   SHA-256(email). The salt is guessable by design; it buys us "no salt
//!   storage, no extra lookup at login" at the cost of targeted
//!   precomputation resistance. The iteration count is the defense.
//!
//! `hash_duress` — duress-password hash under a fixed, public salt. Only
//!   ever compared for equality, never used as key material.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

/// PBKDF2 iteration count for both the master key and the duress hash.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Fixed, non-secret salt for duress hashing. Changing this constant
/// invalidates every stored duress hash.
const DURESS_SALT: &[u8] = b"PHOTON_DURESS_SALT";

/// 32-byte master key derived from the user password. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct MasterKey(pub [u8; 32]);

impl MasterKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Deterministic 16-byte salt for an account: SHA-256(email), truncated.
pub fn salt_for_email(email: &str) -> [u8; 16] {
    let digest = Sha256::digest(email.as_bytes());
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&digest[..16]);
    salt
}

/// Derive the vault master key from a password and per-account salt.
/// Pure: the same (password, salt) pair always yields the same key.
pub fn derive_master_key(password: &str, salt: &[u8; 16]) -> MasterKey {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out);
    MasterKey(out)
}

/// Hash a duress password for storage on the account record.
/// Same KDF and iteration count as the master key, but under the fixed
/// public salt, base64-encoded for the document store.
pub fn hash_duress(password: &str) -> String {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), DURESS_SALT, PBKDF2_ITERATIONS, &mut out);
    STANDARD.encode(out)
}

/// Constant-time comparison of a supplied password against a stored duress
/// hash. A malformed stored hash never matches.
pub fn duress_matches(stored_hash_b64: &str, password: &str) -> bool {
    let Ok(stored) = STANDARD.decode(stored_hash_b64) else {
        return false;
    };
    if stored.len() != 32 {
        return false;
    }
    let mut candidate = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), DURESS_SALT, PBKDF2_ITERATIONS, &mut candidate);
    candidate.ct_eq(&stored[..]).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_key_is_deterministic() {
        let salt = salt_for_email("alice@example.com");
        let a = derive_master_key("hunter2", &salt);
        let b = derive_master_key("hunter2", &salt);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_passwords_give_different_keys() {
        let salt = salt_for_email("alice@example.com");
        let a = derive_master_key("hunter2", &salt);
        let b = derive_master_key("hunter3", &salt);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn salt_depends_only_on_email() {
        assert_eq!(
            salt_for_email("alice@example.com"),
            salt_for_email("alice@example.com")
        );
        assert_ne!(
            salt_for_email("alice@example.com"),
            salt_for_email("bob@example.com")
        );
    }

    #[test]
    fn duress_hash_round_trip() {
        let stored = hash_duress("emergency");
        assert!(duress_matches(&stored, "emergency"));
        assert!(!duress_matches(&stored, "Emergency"));
    }

    #[test]
    fn malformed_stored_duress_hash_never_matches() {
        assert!(!duress_matches("not base64!!", "emergency"));
        assert!(!duress_matches("c2hvcnQ=", "emergency")); // wrong length
    }
}

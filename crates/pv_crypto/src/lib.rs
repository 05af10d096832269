//! pv_crypto — Photon Vault cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Public APIs return opaque newtypes to prevent accidental misuse.
//!
//! # Module layout
//! - `kdf`    — PBKDF2 master-key derivation, per-account salt, duress hashing
//! - `aead`   — AES-256-GCM vault blob encrypt/decrypt (`b64(nonce):b64(ct)`)
//! - `kem`    — ML-KEM-1024 keypair / encapsulate / decapsulate
//! - `error`  — unified error type

pub mod aead;
pub mod error;
pub mod kdf;
pub mod kem;

pub use error::CryptoError;

//! helix_crypto — HeliX session core cryptographic primitives
//!
//! # Module layout
//! - `ecdh`  — ephemeral P-256 keypair generation, SPKI import/export, ECDH
//! - `kdf`   — HKDF-SHA256 derivation from a raw ECDH shared secret
//! - `aead`  — AES-256-GCM seal/open
//! - `hash`  — SHA-256 and random byte generation
//! - `sas`   — Short Authentication String derivation
//! - `error` — unified error type
//!
//! No custom crypto primitives: every operation is a thin wrapper over an
//! audited RustCrypto crate (`p256`, `aes-gcm`, `hkdf`, `sha2`).

pub mod aead;
pub mod ecdh;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod sas;

pub use error::CryptoError;

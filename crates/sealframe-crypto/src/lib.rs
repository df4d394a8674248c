//! Sealframe Cryptographic Engine
//!
//! Multi-recipient envelopes, bounded-memory segmented AEAD, and
//! forward-secure sessions over Ed25519 identity keys. Randomness comes from
//! an [`Environment`] so tests can run against a seeded RNG.
//!
//! # Layers
//!
//! ```text
//! Ed25519 keys ──┬── signatures
//!                ├── key export at rest (HKDF-SHA512 + AES-256-GCM)
//!                │
//!   KDF2 ────────┼── envelope recipient wrapping ──┐
//!                │                                 ├── EnvelopeCipher
//!   AES-256-GCM ─┴── StreamCipher / ChunkCipher ───┘
//!                │
//!   KDF2 + X25519 ── PFS handshake ── Session (XChaCha20-Poly1305 per message)
//! ```
//!
//! # Security
//!
//! Confidentiality and integrity:
//! - Every ciphertext is AEAD-authenticated; any tag failure is
//!   [`CryptoError::AuthenticationFailed`]
//! - Segmented streams flag their last segment, so truncation at a segment
//!   boundary is detected
//!
//! Key hygiene:
//! - Private seeds, content keys and session keys are zeroized on drop
//! - Empty (zero-valued) keys are rejected before any cryptographic work
//! - Key agreements producing an all-zero secret are rejected
//!
//! Forward secrecy:
//! - Sessions mix ephemeral Diffie-Hellman into their keys
//! - Each session message uses a key derived from a fresh random salt

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod env;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod kdf;
pub mod key_export;
pub mod keys;
pub mod pfs;
pub mod signature;

pub use aead::{chunk::ChunkCipher, stream::StreamCipher};
pub use env::{Environment, SystemEnv};
pub use envelope::{EnvelopeCipher, PasswordKdf, Recipient};
pub use error::CryptoError;
pub use fingerprint::{FingerprintAlgorithm, KeyId};
pub use kdf::kdf2;
pub use keys::{Ed25519Keypair, Ed25519PrivateKey, Ed25519PublicKey};
pub use pfs::{
    InitiatorHello, PrekeyBundle, ResponderKeys, Role, Session, SessionMessage, receive_session,
    start_session,
};

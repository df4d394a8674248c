//! Sealframe Crypto Facade
//!
//! Key-typed surface over `sealframe-crypto`. Callers hold
//! [`PublicKey`]/[`PrivateKey`] handles that may carry any algorithm; the
//! facade checks each handle once per operation and hands the concrete
//! Ed25519 key to the engine.
//!
//! ```text
//! caller ──► Crypto<E> ──┬── resolve keys (UnsupportedKeyType / InvalidKey)
//!                        ├── EnvelopeCipher / signatures / key export
//!                        ├── StreamCipher / ChunkCipher (configured sizes)
//!                        ├── PFS handshake ──► Session
//!                        └── DiagnosticSink (operation + key id only)
//! ```
//!
//! # Example
//!
//! ```
//! use sealframe_core::{Crypto, CryptoConfig};
//!
//! let crypto = Crypto::new(CryptoConfig::default())?;
//! let alice = crypto.generate_keypair()?;
//!
//! let sealed = crypto.encrypt(b"hello", &[alice.public_key()])?;
//! assert_eq!(crypto.decrypt(&sealed, alice.private_key())?, b"hello");
//! # Ok::<(), sealframe_core::CryptoError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod diagnostics;
pub mod facade;
pub mod keys;

pub use config::CryptoConfig;
pub use diagnostics::{DiagnosticEvent, DiagnosticSink, LogLevel, TracingSink};
pub use facade::{Crypto, EnvelopeRecipient, OwnPrekeys, PeerPrekeys};
pub use keys::{ForeignKey, Keypair, PrivateKey, PublicKey};
pub use sealframe_crypto::{
    CryptoError, Environment, FingerprintAlgorithm, KeyId, PasswordKdf, Session, SessionMessage,
    SystemEnv,
};

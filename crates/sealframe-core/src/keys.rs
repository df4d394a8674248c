//! Capability-typed key handles.
//!
//! The facade accepts keys of any algorithm a collaborator might hand it
//! (card services, key stores) but the engine only implements Ed25519.
//! Every operation resolves its key arguments once, up front: a foreign key
//! is `UnsupportedKeyType`, an empty key is `InvalidKey`, and only then does
//! cryptographic work start.

use std::fmt;

use sealframe_crypto::{CryptoError, Ed25519PrivateKey, Ed25519PublicKey};

/// Key material of an algorithm the engine does not implement.
#[derive(Clone, PartialEq, Eq)]
pub struct ForeignKey {
    algorithm: String,
    material: Vec<u8>,
}

impl ForeignKey {
    /// Wrap opaque key material tagged with its algorithm name.
    pub fn new(algorithm: impl Into<String>, material: Vec<u8>) -> Self {
        Self { algorithm: algorithm.into(), material }
    }

    /// Algorithm name.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Raw key material.
    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignKey")
            .field("algorithm", &self.algorithm)
            .field("len", &self.material.len())
            .finish()
    }
}

/// A public key of any algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// Ed25519 (supported)
    Ed25519(Ed25519PublicKey),
    /// Any other algorithm (rejected by every operation)
    Foreign(ForeignKey),
}

/// A private key of any algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateKey {
    /// Ed25519 (supported)
    Ed25519(Ed25519PrivateKey),
    /// Any other algorithm (rejected by every operation)
    Foreign(ForeignKey),
}

impl PublicKey {
    /// Algorithm name.
    pub fn algorithm(&self) -> &str {
        match self {
            Self::Ed25519(_) => "ed25519",
            Self::Foreign(key) => key.algorithm(),
        }
    }

    /// True if the key holds no material.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Ed25519(key) => key.is_empty(),
            Self::Foreign(key) => key.material.is_empty(),
        }
    }

    pub(crate) fn resolve(
        &self,
        operation: &'static str,
    ) -> Result<&Ed25519PublicKey, CryptoError> {
        match self {
            Self::Ed25519(key) if key.is_empty() => Err(CryptoError::InvalidKey {
                operation,
                reason: "public key is empty".to_string(),
            }),
            Self::Ed25519(key) => Ok(key),
            Self::Foreign(key) => Err(CryptoError::UnsupportedKeyType {
                operation,
                algorithm: key.algorithm.clone(),
            }),
        }
    }
}

impl PrivateKey {
    /// Algorithm name.
    pub fn algorithm(&self) -> &str {
        match self {
            Self::Ed25519(_) => "ed25519",
            Self::Foreign(key) => key.algorithm(),
        }
    }

    /// True if the key holds no material.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Ed25519(key) => key.is_empty(),
            Self::Foreign(key) => key.material.is_empty(),
        }
    }

    pub(crate) fn resolve(
        &self,
        operation: &'static str,
    ) -> Result<&Ed25519PrivateKey, CryptoError> {
        match self {
            Self::Ed25519(key) if key.is_empty() => Err(CryptoError::InvalidKey {
                operation,
                reason: "private key is empty".to_string(),
            }),
            Self::Ed25519(key) => Ok(key),
            Self::Foreign(key) => Err(CryptoError::UnsupportedKeyType {
                operation,
                algorithm: key.algorithm.clone(),
            }),
        }
    }
}

impl From<Ed25519PublicKey> for PublicKey {
    fn from(key: Ed25519PublicKey) -> Self {
        Self::Ed25519(key)
    }
}

impl From<Ed25519PrivateKey> for PrivateKey {
    fn from(key: Ed25519PrivateKey) -> Self {
        Self::Ed25519(key)
    }
}

/// A private key and its public key, created together.
#[derive(Debug, Clone)]
pub struct Keypair {
    private: PrivateKey,
    public: PublicKey,
}

impl Keypair {
    pub(crate) fn new(private: PrivateKey, public: PublicKey) -> Self {
        Self { private, public }
    }

    /// Private half.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// Public half.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Split into owned halves.
    pub fn into_parts(self) -> (PrivateKey, PublicKey) {
        (self.private, self.public)
    }
}

/// Resolve a list of public keys, failing on the first unusable one.
pub(crate) fn resolve_all<'a>(
    keys: &[&'a PublicKey],
    operation: &'static str,
) -> Result<Vec<&'a Ed25519PublicKey>, CryptoError> {
    keys.iter().map(|key| key.resolve(operation)).collect()
}

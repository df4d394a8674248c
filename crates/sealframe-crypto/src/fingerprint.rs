//! Content fingerprints and key identifiers.
//!
//! A key identifier is the fingerprint of a public key's encoded form.
//! Envelopes use it to find the recipient entry for a decrypting key, so the
//! sender and receiver must agree on the fingerprint algorithm.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

/// Length of a legacy truncated SHA-512 identifier.
pub const TRUNCATED_ID_LEN: usize = 8;

/// Hash used for fingerprints and key identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FingerprintAlgorithm {
    /// Full 32-byte SHA-256 digest
    #[default]
    Sha256,
    /// First 8 bytes of SHA-512 (legacy recipient identifiers)
    Sha512Truncated,
}

impl FingerprintAlgorithm {
    /// Fingerprint of arbitrary bytes.
    pub fn fingerprint(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha512Truncated => Sha512::digest(data)[..TRUNCATED_ID_LEN].to_vec(),
        }
    }
}

/// Identifier of a public key, used to match envelope recipients.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    /// Wrap raw identifier bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({self})")
    }
}

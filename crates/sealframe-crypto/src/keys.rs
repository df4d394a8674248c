//! Ed25519 key handles.
//!
//! Identity keys are Ed25519. Signatures use them directly; key agreement
//! converts them to X25519 (private seed via SHA-512 clamping, public point
//! via the birational map to Montgomery form), the same conversion libsodium
//! performs.
//!
//! # Encoding
//!
//! ```text
//! public:  [algorithm: 0x01][point: 32 bytes]
//! private: [algorithm: 0x01][seed: 32 bytes]
//! ```
//!
//! A zero-valued key (the `Default`) is empty. Empty keys can be held and
//! compared but every cryptographic operation rejects them with
//! [`CryptoError::InvalidKey`].

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::{
    env::Environment,
    error::CryptoError,
    fingerprint::{FingerprintAlgorithm, KeyId},
};

/// Algorithm tag for Ed25519 in encoded keys.
pub const ALGORITHM_ED25519: u8 = 0x01;

/// Raw key length (point or seed).
pub const KEY_LEN: usize = 32;

/// Encoded key length (tag plus raw key).
pub const ENCODED_KEY_LEN: usize = 1 + KEY_LEN;

/// Ed25519 public key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey {
    bytes: [u8; KEY_LEN],
}

impl Ed25519PublicKey {
    /// Parse a compressed Edwards point.
    ///
    /// Rejects points that do not decompress and small-order points, which
    /// would make every Diffie-Hellman result predictable.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Result<Self, CryptoError> {
        let key = Self { bytes };
        key.verifying_key("import public key")?;
        Ok(key)
    }

    /// Raw point bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// True for the zero-valued key.
    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// Tagged encoding (`0x01 || point`).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENCODED_KEY_LEN);
        out.push(ALGORITHM_ED25519);
        out.extend_from_slice(&self.bytes);
        out
    }

    /// Parse the tagged encoding.
    pub fn decode(data: &[u8]) -> Result<Self, CryptoError> {
        let bytes = decode_tagged("import public key", data)?;
        Self::from_bytes(bytes)
    }

    /// Identifier used to address this key as an envelope recipient.
    pub fn identifier(&self, algorithm: FingerprintAlgorithm) -> KeyId {
        KeyId::from_bytes(algorithm.fingerprint(&self.encode()))
    }

    pub(crate) fn verifying_key(
        &self,
        operation: &'static str,
    ) -> Result<VerifyingKey, CryptoError> {
        if self.is_empty() {
            return Err(CryptoError::invalid_key(operation, "public key is empty"));
        }
        let key = VerifyingKey::from_bytes(&self.bytes)
            .map_err(|_| CryptoError::invalid_key(operation, "not a valid Ed25519 point"))?;
        if key.is_weak() {
            return Err(CryptoError::invalid_key(operation, "small-order Ed25519 point"));
        }
        Ok(key)
    }

    /// Montgomery u-coordinate for X25519.
    pub(crate) fn to_x25519(&self, operation: &'static str) -> Result<[u8; KEY_LEN], CryptoError> {
        Ok(self.verifying_key(operation)?.to_montgomery().to_bytes())
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519PublicKey({})", hex::encode(self.bytes))
    }
}

/// Ed25519 private key (32-byte seed).
///
/// The seed is zeroized on drop.
#[derive(Clone, Default)]
pub struct Ed25519PrivateKey {
    seed: [u8; KEY_LEN],
}

impl Ed25519PrivateKey {
    /// Wrap an existing seed.
    pub fn from_seed(seed: [u8; KEY_LEN]) -> Self {
        Self { seed }
    }

    /// Generate a fresh key from the environment's entropy.
    pub fn generate(env: &impl Environment) -> Result<Self, CryptoError> {
        let mut seed = Zeroizing::new([0u8; KEY_LEN]);
        env.random_bytes(&mut *seed)?;
        Ok(Self { seed: *seed })
    }

    /// True for the zero-valued key.
    pub fn is_empty(&self) -> bool {
        self.seed.iter().all(|&b| b == 0)
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> Result<Ed25519PublicKey, CryptoError> {
        let signing = self.signing_key("extract public key")?;
        Ok(Ed25519PublicKey { bytes: signing.verifying_key().to_bytes() })
    }

    /// Tagged encoding (`0x01 || seed`).
    pub fn encode(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(ENCODED_KEY_LEN));
        out.push(ALGORITHM_ED25519);
        out.extend_from_slice(&self.seed);
        out
    }

    /// Parse the tagged encoding.
    pub fn decode(data: &[u8]) -> Result<Self, CryptoError> {
        let seed = decode_tagged("import private key", data)?;
        let key = Self { seed };
        if key.is_empty() {
            return Err(CryptoError::invalid_key("import private key", "private key is empty"));
        }
        Ok(key)
    }

    /// X25519 Diffie-Hellman with a peer's converted Ed25519 key.
    pub fn diffie_hellman(
        &self,
        peer: &Ed25519PublicKey,
        operation: &'static str,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
        self.agree_montgomery(peer.to_x25519(operation)?, operation)
    }

    /// X25519 with a raw Montgomery u-coordinate (ephemeral envelope keys).
    pub(crate) fn agree_montgomery(
        &self,
        point: [u8; KEY_LEN],
        operation: &'static str,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
        let scalar = self.x25519_scalar(operation)?;
        x25519_agree(&scalar, point, operation)
    }

    pub(crate) fn signing_key(&self, operation: &'static str) -> Result<SigningKey, CryptoError> {
        if self.is_empty() {
            return Err(CryptoError::invalid_key(operation, "private key is empty"));
        }
        Ok(SigningKey::from_bytes(&self.seed))
    }

    /// Unclamped X25519 scalar: first half of SHA-512(seed).
    fn x25519_scalar(
        &self,
        operation: &'static str,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
        if self.is_empty() {
            return Err(CryptoError::invalid_key(operation, "private key is empty"));
        }
        let mut digest = Sha512::digest(self.seed);
        let mut scalar = Zeroizing::new([0u8; KEY_LEN]);
        scalar.copy_from_slice(&digest[..KEY_LEN]);
        digest.as_mut_slice().zeroize();
        Ok(scalar)
    }
}

impl PartialEq for Ed25519PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        // Not constant time; comparisons are for tests and bookkeeping.
        self.seed == other.seed
    }
}

impl Eq for Ed25519PrivateKey {}

impl fmt::Debug for Ed25519PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ed25519PrivateKey(..)")
    }
}

impl Drop for Ed25519PrivateKey {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

/// An Ed25519 private key and its public key.
#[derive(Debug, Clone)]
pub struct Ed25519Keypair {
    private: Ed25519PrivateKey,
    public: Ed25519PublicKey,
}

impl Ed25519Keypair {
    /// Generate a fresh keypair.
    pub fn generate(env: &impl Environment) -> Result<Self, CryptoError> {
        Self::from_private(Ed25519PrivateKey::generate(env)?)
    }

    /// Build a keypair around an existing private key.
    pub fn from_private(private: Ed25519PrivateKey) -> Result<Self, CryptoError> {
        let public = private.public_key()?;
        Ok(Self { private, public })
    }

    /// Private half.
    pub fn private_key(&self) -> &Ed25519PrivateKey {
        &self.private
    }

    /// Public half.
    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public
    }
}

/// X25519 scalar multiplication that rejects an all-zero shared secret.
pub(crate) fn x25519_agree(
    scalar: &[u8; KEY_LEN],
    point: [u8; KEY_LEN],
    operation: &'static str,
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    let shared = Zeroizing::new(x25519_dalek::x25519(*scalar, point));
    if shared.iter().all(|&b| b == 0) {
        return Err(CryptoError::invalid_key(operation, "key agreement produced a zero secret"));
    }
    Ok(shared)
}

fn decode_tagged(operation: &'static str, data: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    let Some((&tag, body)) = data.split_first() else {
        return Err(CryptoError::invalid_key(operation, "encoded key is empty"));
    };
    if tag != ALGORITHM_ED25519 {
        return Err(CryptoError::UnsupportedKeyType {
            operation,
            algorithm: format!("tag {tag:#04x}"),
        });
    }
    let Ok(bytes) = <[u8; KEY_LEN]>::try_from(body) else {
        return Err(CryptoError::invalid_key(
            operation,
            format!("expected {KEY_LEN} key bytes, got {}", body.len()),
        ));
    };
    Ok(bytes)
}

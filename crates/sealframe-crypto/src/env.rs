//! Environment abstraction for randomness.
//!
//! Decouples key generation, nonces and salts from the OS entropy source.
//! Production code uses [`SystemEnv`]; tests plug in a seeded RNG to get
//! reproducible keys and ciphertexts.

use crate::error::CryptoError;

/// Source of cryptographically secure random bytes.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - A failure is reported, never papered over with weaker randomness
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError>;

    /// Returns a fresh random array.
    fn random_array<const N: usize>(&self) -> Result<[u8; N], CryptoError> {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes)?;
        Ok(bytes)
    }
}

/// Production environment backed by the OS RNG (getrandom).
///
/// Uses `/dev/urandom`, `getrandom(2)`, `BCryptGenRandom` or the platform
/// equivalent. Suitable for long-term keys, ephemeral keys, nonces and salts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(buffer).map_err(|e| CryptoError::RandomSource { reason: e.to_string() })
    }
}

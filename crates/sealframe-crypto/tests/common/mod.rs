//! Shared helpers for property tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sealframe_crypto::{CryptoError, Ed25519Keypair, Environment, PasswordKdf};

/// Deterministic environment: same seed, same keys, nonces and salts.
#[derive(Clone)]
pub struct SeededEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SeededEnv {
    pub fn new(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Environment for SeededEnv {
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        self.rng.lock().unwrap().fill_bytes(buffer);
        Ok(())
    }
}

/// Environment whose entropy source always fails.
#[derive(Clone)]
pub struct BrokenEnv;

impl Environment for BrokenEnv {
    fn random_bytes(&self, _buffer: &mut [u8]) -> Result<(), CryptoError> {
        Err(CryptoError::RandomSource { reason: "entropy unavailable".to_string() })
    }
}

/// Argon2 costs small enough for property tests.
pub const FAST_KDF: PasswordKdf = PasswordKdf { memory_kib: 64, iterations: 1, parallelism: 1 };

pub fn keypairs(env: &SeededEnv, count: usize) -> Vec<Ed25519Keypair> {
    (0..count).map(|_| Ed25519Keypair::generate(env).unwrap()).collect()
}

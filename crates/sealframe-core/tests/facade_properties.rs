//! Property-based tests for the Crypto facade
//!
//! 1. **Dispatch**: foreign keys fail with `UnsupportedKeyType` in every
//!    operation, before any randomness is drawn
//! 2. **Round-trip**: envelopes, signatures and key export survive the
//!    capability-typed surface unchanged
//! 3. **Sessions**: facade-established sessions talk in both directions

use std::{
    io::Cursor,
    sync::{Arc, Mutex},
};

use proptest::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sealframe_core::{
    Crypto, CryptoConfig, CryptoError, EnvelopeRecipient, Environment, ForeignKey, OwnPrekeys,
    PasswordKdf, PeerPrekeys, PrivateKey, PublicKey,
};

#[derive(Clone)]
struct SeededEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    draws: Arc<Mutex<usize>>,
}

impl SeededEnv {
    fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            draws: Arc::new(Mutex::new(0)),
        }
    }

    fn draws(&self) -> usize {
        *self.draws.lock().unwrap()
    }
}

impl Environment for SeededEnv {
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        *self.draws.lock().unwrap() += 1;
        self.rng.lock().unwrap().fill_bytes(buffer);
        Ok(())
    }
}

fn crypto(seed: u64) -> (Crypto<SeededEnv>, SeededEnv) {
    let env = SeededEnv::new(seed);
    let config = CryptoConfig {
        password_kdf: PasswordKdf { memory_kib: 64, iterations: 1, parallelism: 1 },
        ..CryptoConfig::default()
    };
    (Crypto::with_env(env.clone(), config).unwrap(), env)
}

fn foreign_public() -> PublicKey {
    PublicKey::Foreign(ForeignKey::new("ecdsa-p256", vec![2; 33]))
}

fn foreign_private() -> PrivateKey {
    PrivateKey::Foreign(ForeignKey::new("ecdsa-p256", vec![3; 32]))
}

fn is_unsupported<T>(result: &Result<T, CryptoError>) -> bool {
    matches!(result, Err(CryptoError::UnsupportedKeyType { .. }))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_envelope_roundtrip_through_facade(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        seed in any::<u64>(),
    ) {
        let (crypto, _) = crypto(seed);
        let alice = crypto.generate_keypair().unwrap();
        let bob = crypto.generate_keypair().unwrap();

        let sealed = crypto
            .sign_then_encrypt(&plaintext, alice.private_key(), &[bob.public_key()])
            .unwrap();
        let opened = crypto
            .decrypt_then_verify(&sealed, bob.private_key(), &[alice.public_key()])
            .unwrap();
        prop_assert_eq!(opened, plaintext);
    }

    #[test]
    fn prop_foreign_keys_rejected_without_randomness(
        data in prop::collection::vec(any::<u8>(), 0..128),
        seed in any::<u64>(),
    ) {
        let (crypto, env) = crypto(seed);
        let alice = crypto.generate_keypair().unwrap();
        let foreign_pub = foreign_public();
        let foreign_priv = foreign_private();
        let before = env.draws();

        prop_assert!(is_unsupported(&crypto.encrypt(&data, &[alice.public_key(), &foreign_pub])));
        let recipients = [alice.public_key()];
        prop_assert!(is_unsupported(&crypto.sign_then_encrypt(&data, &foreign_priv, &recipients)));
        prop_assert!(is_unsupported(&crypto.decrypt(&data, &foreign_priv)));
        prop_assert!(is_unsupported(&crypto.sign(&data, &foreign_priv)));
        prop_assert!(is_unsupported(&crypto.verify_signature(&data, &[0; 64], &foreign_pub)));
        prop_assert!(is_unsupported(&crypto.export_private_key(&foreign_priv, b"pw")));
        prop_assert!(is_unsupported(&crypto.export_public_key(&foreign_pub)));
        prop_assert!(is_unsupported(&crypto.extract_public_key(&foreign_priv)));
        prop_assert!(is_unsupported(&crypto.key_identifier(&foreign_pub)));

        let mut sink = Vec::new();
        prop_assert!(is_unsupported(&crypto.sign_then_encrypt_stream(
            &mut Cursor::new(&data),
            &mut sink,
            &foreign_priv,
            &[EnvelopeRecipient::Key(alice.public_key())],
        )));
        prop_assert!(is_unsupported(&crypto.decrypt_then_verify_stream(
            &mut Cursor::new(&data),
            &mut sink,
            alice.private_key(),
            &[&foreign_pub],
        )));
        prop_assert!(sink.is_empty());

        prop_assert_eq!(env.draws(), before);
    }

    #[test]
    fn prop_detached_signature_roundtrip(
        data in prop::collection::vec(any::<u8>(), 0..1024),
        seed in any::<u64>(),
    ) {
        let (crypto, _) = crypto(seed);
        let signer = crypto.generate_keypair().unwrap();
        let other = crypto.generate_keypair().unwrap();

        let signature = crypto.sign(&data, signer.private_key()).unwrap();
        prop_assert_eq!(signature.len(), 64);
        prop_assert!(crypto.verify_signature(&data, &signature, signer.public_key()).is_ok());

        let result = crypto.verify_signature(&data, &signature, other.public_key());
        let is_sig_failure = matches!(result, Err(CryptoError::SignatureVerificationFailed { .. }));
        prop_assert!(is_sig_failure);
    }

    #[test]
    fn prop_private_key_export_roundtrip(
        password in prop::collection::vec(any::<u8>(), 0..32),
        seed in any::<u64>(),
    ) {
        let (crypto, _) = crypto(seed);
        let pair = crypto.generate_keypair().unwrap();

        let exported = crypto.export_private_key(pair.private_key(), &password).unwrap();
        let imported = crypto.import_private_key(&exported, &password).unwrap();
        prop_assert_eq!(&imported, pair.private_key());
        prop_assert_eq!(&crypto.extract_public_key(&imported).unwrap(), pair.public_key());
    }

    #[test]
    fn prop_pfs_session_through_facade(
        messages in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..128), 1..6),
        use_one_time in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let (crypto, _) = crypto(seed);
        let alice_ik = crypto.generate_keypair().unwrap();
        let alice_ek = crypto.generate_keypair().unwrap();
        let bob_ik = crypto.generate_keypair().unwrap();
        let bob_ltk = crypto.generate_keypair().unwrap();
        let bob_otk = crypto.generate_keypair().unwrap();

        let peer = PeerPrekeys {
            identity: bob_ik.public_key(),
            long_term: bob_ltk.public_key(),
            one_time: use_one_time.then(|| bob_otk.public_key()),
        };
        let alice = crypto
            .start_pfs_session(alice_ik.private_key(), alice_ek.private_key(), &peer, b"chat")
            .unwrap();

        let own = OwnPrekeys {
            identity: bob_ik.private_key(),
            long_term: bob_ltk.private_key(),
            one_time: use_one_time.then(|| bob_otk.private_key()),
        };
        let bob = crypto
            .receive_pfs_session(&own, alice_ik.public_key(), alice_ek.public_key(), b"chat")
            .unwrap();

        for message in &messages {
            let sealed = crypto.session_encrypt(&alice, message).unwrap();
            prop_assert_eq!(&crypto.session_decrypt(&bob, &sealed).unwrap(), message);

            let reply = crypto.session_encrypt(&bob, message).unwrap();
            prop_assert_eq!(&crypto.session_decrypt(&alice, &reply).unwrap(), message);
        }
    }
}

#[test]
fn stream_envelope_through_facade() {
    let (crypto, _) = crypto(21);
    let pair = crypto.generate_keypair().unwrap();
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    let mut sealed = Vec::new();
    let recipients = [EnvelopeRecipient::Key(pair.public_key())];
    let consumed =
        crypto.encrypt_stream(&mut Cursor::new(&data), &mut sealed, &recipients).unwrap();
    assert_eq!(consumed, data.len() as u64);

    let mut opened = Vec::new();
    let key = pair.private_key();
    let written = crypto.decrypt_stream(&mut Cursor::new(&sealed), &mut opened, key).unwrap();
    assert_eq!(written, data.len() as u64);
    assert_eq!(opened, data);
}

#[test]
fn stream_cipher_uses_configured_buffer() {
    let env = SeededEnv::new(3);
    let config = CryptoConfig { stream_buffer_size: 100, ..CryptoConfig::default() };
    let crypto = Crypto::with_env(env, config).unwrap();
    let key = [1u8; 32];
    let nonce = [2u8; 12];

    let mut sealed = Vec::new();
    crypto.stream_encrypt(&key, &nonce, b"", &mut Cursor::new(&[0u8; 250]), &mut sealed).unwrap();
    assert_eq!(sealed.len(), 250 + 3 * 16);

    let mut opened = Vec::new();
    crypto.stream_decrypt(&key, &nonce, b"", &mut Cursor::new(&sealed), &mut opened).unwrap();
    assert_eq!(opened, [0u8; 250]);
}

#[test]
fn same_seed_same_keys() {
    let (first, _) = crypto(77);
    let (second, _) = crypto(77);

    let a = first.generate_keypair().unwrap();
    let b = second.generate_keypair().unwrap();
    assert_eq!(a.public_key(), b.public_key());
}

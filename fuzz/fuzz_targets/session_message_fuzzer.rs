//! Fuzz target for PFS session messages and snapshots
//!
//! Decodes arbitrary bytes as a session message and as a session snapshot,
//! and checks that a fixed established session rejects every forged
//! message.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealframe_crypto::{
    Ed25519Keypair, Ed25519PrivateKey, InitiatorHello, ResponderKeys, Session, SessionMessage,
    receive_session,
};

fn keypair(seed: u8) -> Ed25519Keypair {
    Ed25519Keypair::from_private(Ed25519PrivateKey::from_seed([seed; 32])).unwrap()
}

fn responder() -> Session {
    let (alice_ik, alice_ek, bob_ik, bob_ltk) = (keypair(1), keypair(2), keypair(3), keypair(4));
    let keys = ResponderKeys {
        identity: bob_ik.private_key(),
        long_term: bob_ltk.private_key(),
        one_time: None,
    };
    let hello =
        InitiatorHello { identity: *alice_ik.public_key(), ephemeral: *alice_ek.public_key() };
    receive_session(&keys, &hello, b"fuzz").unwrap()
}

fuzz_target!(|data: &[u8]| {
    let _ = Session::from_bytes(data);

    if let Ok(message) = SessionMessage::decode(data) {
        assert!(responder().decrypt(&message).is_err(), "forged message authenticated");
    }
});

//! Fuzz target for envelope parsing and decryption
//!
//! Feeds arbitrary bytes to the header decoder and to buffered and streaming
//! decrypts with a fixed key. All must return an error for anything they
//! cannot parse or authenticate, never panic, and never allocate past the
//! header and segment caps.

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use sealframe_crypto::{Ed25519PrivateKey, EnvelopeCipher, SystemEnv, envelope::EnvelopeHeader};

fuzz_target!(|data: &[u8]| {
    let _ = EnvelopeHeader::decode(data);

    let key = Ed25519PrivateKey::from_seed([7; 32]);
    let cipher = EnvelopeCipher::new(SystemEnv::new());
    // Forged envelopes must never authenticate.
    assert!(cipher.decrypt(data, &key).is_err());
    assert!(cipher.decrypt_with_password(data, b"password").is_err());

    let mut sink = Vec::new();
    assert!(cipher.decrypt_stream(&mut Cursor::new(data), &mut sink, &key).is_err());
});

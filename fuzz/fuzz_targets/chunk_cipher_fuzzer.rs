//! Fuzz target for the chunked AEAD cipher
//!
//! # Strategy
//!
//! - Arbitrary plaintexts and chunk sizes (clamped to keep runs fast)
//! - Encrypt, then apply one mutation to the sealed stream
//! - Decrypt the mutated stream
//!
//! # Invariants
//!
//! - Unmutated streams round-trip exactly
//! - Any mutation fails the decode
//! - Output written before a failure is a prefix of the plaintext
//! - Arbitrary input to the decoder never panics

#![no_main]

use std::io::Cursor;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealframe_crypto::ChunkCipher;

#[derive(Debug, Arbitrary)]
struct ChunkScenario {
    plaintext: Vec<u8>,
    chunk_size: u8,
    mutation: Mutation,
    raw: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum Mutation {
    None,
    FlipBit { position: u16, bit: u8 },
    Truncate { keep: u16 },
    Append { extra: Vec<u8> },
}

const KEY: [u8; 32] = [0x11; 32];
const NONCE: [u8; 12] = [0x22; 12];
const AD: &[u8] = b"fuzz";

fuzz_target!(|scenario: ChunkScenario| {
    let Ok(cipher) = ChunkCipher::new(usize::from(scenario.chunk_size).max(1)) else {
        return;
    };

    // Decoder on raw bytes
    let mut sink = Vec::new();
    let _ = cipher.decrypt(&KEY, &NONCE, AD, &mut Cursor::new(&scenario.raw), &mut sink);

    let mut sealed = Vec::new();
    cipher
        .encrypt(&KEY, &NONCE, AD, &mut Cursor::new(&scenario.plaintext), &mut sealed)
        .unwrap();

    let mutated = match scenario.mutation {
        Mutation::None => false,
        Mutation::FlipBit { position, bit } => {
            let index = usize::from(position) % sealed.len();
            sealed[index] ^= 1 << (bit % 8);
            true
        },
        Mutation::Truncate { keep } => {
            let keep = usize::from(keep) % sealed.len();
            sealed.truncate(keep);
            true
        },
        Mutation::Append { extra } => {
            let appended = !extra.is_empty();
            sealed.extend_from_slice(&extra);
            appended
        },
    };

    let mut opened = Vec::new();
    let result = cipher.decrypt(&KEY, &NONCE, AD, &mut Cursor::new(&sealed), &mut opened);

    if mutated {
        assert!(result.is_err(), "mutated stream decrypted");
        assert!(scenario.plaintext.starts_with(&opened), "output is not a plaintext prefix");
    } else {
        assert_eq!(result.unwrap(), scenario.plaintext.len() as u64);
        assert_eq!(opened, scenario.plaintext);
    }
});

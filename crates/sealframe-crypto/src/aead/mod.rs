//! Authenticated encryption primitives.
//!
//! One-shot AES-256-GCM helpers shared by the envelope and key export code,
//! plus two segmented modes for payloads that should not be held in memory:
//!
//! - [`stream`]: fixed-size segments back to back, no framing
//! - [`chunk`]: caller-sized chunks, each length-prefixed
//!
//! Both segmented modes derive per-segment nonces with [`segment_nonce`] and
//! mark the last segment, so truncation at a boundary, reordering and
//! duplication all fail authentication.

pub mod chunk;
pub mod stream;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::error::CryptoError;

/// AES-256 key length.
pub const AES_KEY_LEN: usize = 32;

/// AES-GCM nonce length.
pub const AES_NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const AES_TAG_LEN: usize = 16;

/// Encrypt with AES-256-GCM.
pub(crate) fn aes_seal(
    key: &[u8; AES_KEY_LEN],
    nonce: &[u8; AES_NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::InvalidParameter {
            reason: format!("plaintext of {} bytes exceeds AES-GCM limit", plaintext.len()),
        })
}

/// Decrypt with AES-256-GCM.
pub(crate) fn aes_open(
    key: &[u8; AES_KEY_LEN],
    nonce: &[u8; AES_NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
    operation: &'static str,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthenticationFailed { operation })
}

/// Nonce for segment `index` of a segmented stream.
///
/// ```text
/// nonce[3..11] ^= BE64(index)
/// nonce[11]    ^= 1 if last segment
/// ```
pub fn segment_nonce(base: &[u8; AES_NONCE_LEN], index: u64, last: bool) -> [u8; AES_NONCE_LEN] {
    let mut nonce = *base;
    for (byte, counter) in nonce[3..11].iter_mut().zip(index.to_be_bytes()) {
        *byte ^= counter;
    }
    if last {
        nonce[11] ^= 1;
    }
    nonce
}

/// Read until `buf` is full or the reader is exhausted.
///
/// Returns the number of bytes read; less than `buf.len()` only at EOF.
pub(crate) fn read_full<R: std::io::Read>(
    reader: &mut R,
    buf: &mut [u8],
    operation: &'static str,
) -> Result<usize, CryptoError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
            Err(e) => return Err(CryptoError::io(operation, &e)),
        }
    }
    Ok(filled)
}

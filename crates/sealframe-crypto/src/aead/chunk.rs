//! Length-prefixed chunked AEAD.
//!
//! # Wire Format
//!
//! ```text
//! [len: u32 BE][ciphertext + tag: len bytes]  repeated, last chunk flagged in its nonce
//! ```
//!
//! Each chunk authenticates on its own, so the decryptor emits plaintext as
//! soon as a chunk verifies. When a chunk fails, everything before it has
//! already been written and nothing after it is.
//!
//! The decryptor's `chunk_size` is an upper bound: a length prefix above
//! `chunk_size + 16` is rejected as malformed before anything is allocated.

use std::io::{Read, Write};

use zeroize::Zeroizing;

use super::{
    AES_KEY_LEN, AES_NONCE_LEN, AES_TAG_LEN, aes_open, aes_seal, read_full, segment_nonce,
    stream::{next_index, validate_segment_size},
};
use crate::error::CryptoError;

/// Default plaintext chunk size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Chunked AEAD with explicit per-chunk framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCipher {
    chunk_size: usize,
}

impl Default for ChunkCipher {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

impl ChunkCipher {
    /// Create a cipher with the given plaintext chunk size.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `chunk_size` is zero or too large to frame
    pub fn new(chunk_size: usize) -> Result<Self, CryptoError> {
        validate_segment_size(chunk_size, "chunk size")?;
        Ok(Self { chunk_size })
    }

    /// Plaintext chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Encrypt everything `reader` yields into framed chunks.
    ///
    /// Returns the number of plaintext bytes consumed.
    pub fn encrypt<R: Read, W: Write>(
        &self,
        key: &[u8; AES_KEY_LEN],
        nonce: &[u8; AES_NONCE_LEN],
        ad: &[u8],
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, CryptoError> {
        const OP: &str = "chunk encrypt";

        let mut current = Zeroizing::new(vec![0u8; self.chunk_size]);
        let mut next = Zeroizing::new(vec![0u8; self.chunk_size]);
        let mut len = read_full(reader, &mut current, OP)?;
        let mut index = 0u64;
        let mut total = 0u64;

        loop {
            let next_len =
                if len == self.chunk_size { read_full(reader, &mut next, OP)? } else { 0 };
            let last = next_len == 0;

            let sealed = aes_seal(key, &segment_nonce(nonce, index, last), ad, &current[..len])?;
            // Bounded by validate_segment_size.
            let Ok(prefix) = u32::try_from(sealed.len()) else {
                unreachable!("chunk length fits in u32")
            };
            writer.write_all(&prefix.to_be_bytes()).map_err(|e| CryptoError::io(OP, &e))?;
            writer.write_all(&sealed).map_err(|e| CryptoError::io(OP, &e))?;
            total += len as u64;

            if last {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            len = next_len;
            index = next_index(index)?;
        }

        writer.flush().map_err(|e| CryptoError::io(OP, &e))?;
        Ok(total)
    }

    /// Decrypt framed chunks, writing each chunk's plaintext once it verifies.
    ///
    /// Returns the number of plaintext bytes written.
    ///
    /// # Errors
    ///
    /// - `InvalidFormat` for a length prefix out of range or cut short
    /// - `AuthenticationFailed` for a tampered, truncated, reordered or
    ///   missing chunk
    /// - `Io` if the reader or writer fails
    pub fn decrypt<R: Read, W: Write>(
        &self,
        key: &[u8; AES_KEY_LEN],
        nonce: &[u8; AES_NONCE_LEN],
        ad: &[u8],
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, CryptoError> {
        const OP: &str = "chunk decrypt";

        let max_len = self.chunk_size + AES_TAG_LEN;
        let mut prefix = [0u8; LEN_PREFIX];
        if !read_prefix(reader, &mut prefix)? {
            // A valid stream always has at least one (final) chunk.
            return Err(CryptoError::AuthenticationFailed { operation: OP });
        }

        let mut body = vec![0u8; max_len];
        let mut index = 0u64;
        let mut total = 0u64;

        loop {
            let len = u32::from_be_bytes(prefix) as usize;
            if !(AES_TAG_LEN..=max_len).contains(&len) {
                return Err(CryptoError::format(format!(
                    "chunk {index} length {len} outside {AES_TAG_LEN}..={max_len}"
                )));
            }
            if read_full(reader, &mut body[..len], OP)? < len {
                return Err(CryptoError::AuthenticationFailed { operation: OP });
            }

            let last = !read_prefix(reader, &mut prefix)?;
            let plaintext = Zeroizing::new(aes_open(
                key,
                &segment_nonce(nonce, index, last),
                ad,
                &body[..len],
                OP,
            )?);
            writer.write_all(&plaintext).map_err(|e| CryptoError::io(OP, &e))?;
            total += plaintext.len() as u64;

            if last {
                break;
            }
            index = next_index(index)?;
        }

        writer.flush().map_err(|e| CryptoError::io(OP, &e))?;
        Ok(total)
    }
}

/// Read the next length prefix. Returns `false` at a clean end of input.
fn read_prefix<R: Read>(
    reader: &mut R,
    prefix: &mut [u8; LEN_PREFIX],
) -> Result<bool, CryptoError> {
    match read_full(reader, prefix, "chunk decrypt")? {
        0 => Ok(false),
        LEN_PREFIX => Ok(true),
        n => Err(CryptoError::format(format!("truncated chunk length prefix ({n} bytes)"))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const KEY: [u8; AES_KEY_LEN] = [0x33; AES_KEY_LEN];
    const NONCE: [u8; AES_NONCE_LEN] = [0x44; AES_NONCE_LEN];

    fn encrypt(cipher: ChunkCipher, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        cipher.encrypt(&KEY, &NONCE, b"chunk ad", &mut Cursor::new(data), &mut out).unwrap();
        out
    }

    fn decrypt(cipher: ChunkCipher, data: &[u8], out: &mut Vec<u8>) -> Result<u64, CryptoError> {
        cipher.decrypt(&KEY, &NONCE, b"chunk ad", &mut Cursor::new(data), out)
    }

    #[test]
    fn zero_chunk_size_is_invalid_parameter() {
        assert!(matches!(ChunkCipher::new(0), Err(CryptoError::InvalidParameter { .. })));
    }

    #[test]
    fn empty_input_is_one_framed_tag() {
        let cipher = ChunkCipher::new(8).unwrap();
        let ct = encrypt(cipher, b"");

        assert_eq!(ct[..LEN_PREFIX], [0, 0, 0, 16]);
        assert_eq!(ct.len(), LEN_PREFIX + AES_TAG_LEN);

        let mut out = Vec::new();
        assert_eq!(decrypt(cipher, &ct, &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn roundtrip_one_and_many_chunks() {
        let cipher = ChunkCipher::new(10).unwrap();
        for len in [3usize, 10, 25, 40] {
            let data: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let ct = encrypt(cipher, &data);

            let chunks = len.div_ceil(10);
            assert_eq!(ct.len(), len + chunks * (LEN_PREFIX + AES_TAG_LEN));

            let mut out = Vec::new();
            decrypt(cipher, &ct, &mut out).unwrap();
            assert_eq!(out, data);
        }
    }

    #[test]
    fn corrupted_chunk_keeps_earlier_output() {
        let cipher = ChunkCipher::new(10).unwrap();
        let data: Vec<u8> = (0..30).collect();
        let mut ct = encrypt(cipher, &data);

        // Flip a byte inside the second chunk's ciphertext.
        let frame = LEN_PREFIX + 10 + AES_TAG_LEN;
        ct[frame + LEN_PREFIX + 2] ^= 0x01;

        let mut out = Vec::new();
        let result = decrypt(cipher, &ct, &mut out);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed { .. })));
        assert_eq!(out, data[..10]);
    }

    #[test]
    fn dropped_final_chunk_fails() {
        let cipher = ChunkCipher::new(10).unwrap();
        let ct = encrypt(cipher, &[9u8; 30]);

        let frame = LEN_PREFIX + 10 + AES_TAG_LEN;
        let mut out = Vec::new();
        let result = decrypt(cipher, &ct[..2 * frame], &mut out);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed { .. })));
    }

    #[test]
    fn truncated_body_fails_authentication() {
        let cipher = ChunkCipher::new(10).unwrap();
        let ct = encrypt(cipher, &[9u8; 5]);

        let mut out = Vec::new();
        let result = decrypt(cipher, &ct[..ct.len() - 3], &mut out);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed { .. })));
    }

    #[test]
    fn oversized_length_prefix_is_invalid_format() {
        let cipher = ChunkCipher::new(10).unwrap();
        let mut ct = encrypt(cipher, &[1u8; 5]);
        ct[..4].copy_from_slice(&1000u32.to_be_bytes());

        let mut out = Vec::new();
        assert!(matches!(decrypt(cipher, &ct, &mut out), Err(CryptoError::InvalidFormat { .. })));
    }

    #[test]
    fn partial_length_prefix_is_invalid_format() {
        let cipher = ChunkCipher::new(10).unwrap();
        let mut out = Vec::new();
        let result = decrypt(cipher, &[0, 0], &mut out);
        assert!(matches!(result, Err(CryptoError::InvalidFormat { .. })));
    }

    #[test]
    fn empty_input_fails_authentication() {
        let mut out = Vec::new();
        let result = decrypt(ChunkCipher::default(), b"", &mut out);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed { .. })));
    }
}

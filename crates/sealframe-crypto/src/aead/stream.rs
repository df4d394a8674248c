//! Fixed-segment streaming AEAD.
//!
//! The plaintext is cut into `buffer_size` segments, each sealed with
//! AES-256-GCM under the same key and AD and a per-segment nonce. Segments
//! are written back to back with no framing: every ciphertext segment is
//! `buffer_size + 16` bytes except the last, which may be shorter.
//!
//! ```text
//! [seg 0: buffer_size + tag][seg 1: buffer_size + tag]...[seg n (last): <= buffer_size + tag]
//! ```
//!
//! The encryptor reads one segment ahead so it knows which segment is last
//! and can set the final flag in its nonce. Empty input still produces one
//! (empty, final) segment, so a ciphertext can never be empty.

use std::io::{Read, Write};

use zeroize::Zeroizing;

use super::{AES_KEY_LEN, AES_NONCE_LEN, AES_TAG_LEN, aes_open, aes_seal, read_full, segment_nonce};
use crate::error::CryptoError;

/// Default plaintext segment size (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming AEAD with a fixed segment size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCipher {
    buffer_size: usize,
}

impl Default for StreamCipher {
    fn default() -> Self {
        Self { buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

impl StreamCipher {
    /// Create a cipher with the given plaintext segment size.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `buffer_size` is zero or does not leave room
    ///   for the tag in a `u32`-sized segment
    pub fn new(buffer_size: usize) -> Result<Self, CryptoError> {
        validate_segment_size(buffer_size, "stream buffer size")?;
        Ok(Self { buffer_size })
    }

    /// Plaintext segment size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Encrypt everything `reader` yields into `writer`.
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
        const OP: &str = "stream encrypt";

        let mut current = Zeroizing::new(vec![0u8; self.buffer_size]);
        let mut next = Zeroizing::new(vec![0u8; self.buffer_size]);
        let mut len = read_full(reader, &mut current, OP)?;
        let mut index = 0u64;
        let mut total = 0u64;

        loop {
            let next_len =
                if len == self.buffer_size { read_full(reader, &mut next, OP)? } else { 0 };
            let last = next_len == 0;

            let segment = aes_seal(key, &segment_nonce(nonce, index, last), ad, &current[..len])?;
            writer.write_all(&segment).map_err(|e| CryptoError::io(OP, &e))?;
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

    /// Decrypt a stream produced by [`StreamCipher::encrypt`] with the same
    /// segment size.
    ///
    /// Plaintext is written segment by segment, each only after it verifies.
    /// Returns the number of plaintext bytes written.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed` on any tampered, missing, reordered or
    ///   duplicated segment, or an empty input
    /// - `Io` if the reader or writer fails
    pub fn decrypt<R: Read, W: Write>(
        &self,
        key: &[u8; AES_KEY_LEN],
        nonce: &[u8; AES_NONCE_LEN],
        ad: &[u8],
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, CryptoError> {
        const OP: &str = "stream decrypt";

        let segment_len = self.buffer_size + AES_TAG_LEN;
        let mut current = vec![0u8; segment_len];
        let mut next = vec![0u8; segment_len];
        let mut len = read_full(reader, &mut current, OP)?;
        let mut index = 0u64;
        let mut total = 0u64;

        loop {
            if len < AES_TAG_LEN {
                return Err(CryptoError::AuthenticationFailed { operation: OP });
            }
            let next_len = if len == segment_len { read_full(reader, &mut next, OP)? } else { 0 };
            let last = next_len == 0;

            let plaintext = Zeroizing::new(aes_open(
                key,
                &segment_nonce(nonce, index, last),
                ad,
                &current[..len],
                OP,
            )?);
            writer.write_all(&plaintext).map_err(|e| CryptoError::io(OP, &e))?;
            total += plaintext.len() as u64;

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
}

pub(super) fn validate_segment_size(size: usize, what: &str) -> Result<(), CryptoError> {
    if size == 0 {
        return Err(CryptoError::InvalidParameter { reason: format!("{what} must be non-zero") });
    }
    if size > u32::MAX as usize - AES_TAG_LEN {
        return Err(CryptoError::InvalidParameter { reason: format!("{what} {size} is too large") });
    }
    Ok(())
}

pub(super) fn next_index(index: u64) -> Result<u64, CryptoError> {
    index
        .checked_add(1)
        .ok_or_else(|| CryptoError::InvalidParameter { reason: "segment counter exhausted".into() })
}

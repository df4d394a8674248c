//! Envelope wire format.
//!
//! ```text
//! [header_len: u32 BE][header: CBOR EnvelopeHeader][body]
//! ```
//!
//! The header is small and parsed up front; the body is either one AES-GCM
//! ciphertext or a segmented stream and may be arbitrarily large. A signed
//! stream ends with a fixed-size encrypted signature trailer.
//!
//! The header itself is not encrypted. Its encoded bytes are bound into the
//! body's associated data, so any rewrite fails body authentication.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::{aead::AES_NONCE_LEN, error::CryptoError, fingerprint::KeyId};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Upper bound on the encoded header, checked before allocation.
pub const MAX_HEADER_LEN: usize = 1024 * 1024;

/// Largest stream segment a decoder will allocate for.
pub const MAX_STREAM_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Password salt length.
pub const PASSWORD_SALT_LEN: usize = 16;

/// How the body following the header is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyLayout {
    /// Single AES-256-GCM ciphertext
    Sealed,
    /// Segmented stream (see [`crate::aead::stream`])
    Stream {
        /// Plaintext segment size used by the encryptor
        buffer_size: u32,
    },
    /// Segmented stream followed by an encrypted signature over the
    /// SHA-512 digest of the plaintext
    SignedStream {
        /// Plaintext segment size used by the encryptor
        buffer_size: u32,
    },
}

impl BodyLayout {
    /// Segment size for the streaming layouts.
    pub fn buffer_size(self) -> Option<usize> {
        match self {
            Self::Sealed => None,
            Self::Stream { buffer_size } | Self::SignedStream { buffer_size } => {
                Some(buffer_size as usize)
            },
        }
    }
}

/// One way to recover the content encryption key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientEntry {
    /// Wrapped for a public key via ephemeral X25519
    Key {
        /// Identifier of the recipient's public key
        key_id: KeyId,
        /// Sender's ephemeral X25519 public key
        ephemeral_public: [u8; 32],
        /// AES-GCM wrapped content key (32 bytes + tag)
        wrapped_key: Vec<u8>,
    },
    /// Wrapped under a password via Argon2id
    Password {
        /// Argon2 salt
        salt: [u8; PASSWORD_SALT_LEN],
        /// Argon2 memory cost in KiB
        memory_kib: u32,
        /// Argon2 iteration count
        iterations: u32,
        /// Argon2 lanes
        parallelism: u32,
        /// AES-GCM wrapped content key (32 bytes + tag)
        wrapped_key: Vec<u8>,
    },
}

/// Envelope header: everything a recipient needs before the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Format version, always [`ENVELOPE_VERSION`] on write
    pub version: u8,
    /// Body layout
    pub layout: BodyLayout,
    /// Base nonce for the body
    pub nonce: [u8; AES_NONCE_LEN],
    /// Recipient entries in the order the sender listed them
    pub recipients: Vec<RecipientEntry>,
    /// Signature over the plaintext, encrypted under the content key.
    /// Only sealed bodies carry one here.
    pub signature: Option<Vec<u8>>,
}

impl EnvelopeHeader {
    /// Encode as `[len][CBOR]`.
    pub fn encode(&self) -> Result<Vec<u8>, CryptoError> {
        let mut cbor = Vec::new();
        ciborium::into_writer(self, &mut cbor)
            .map_err(|e| CryptoError::format(format!("header encoding failed: {e}")))?;
        if cbor.len() > MAX_HEADER_LEN {
            return Err(CryptoError::InvalidParameter {
                reason: format!("envelope header of {} bytes exceeds {MAX_HEADER_LEN}", cbor.len()),
            });
        }

        let mut out = Vec::with_capacity(4 + cbor.len());
        // MAX_HEADER_LEN fits in u32.
        out.extend_from_slice(&(cbor.len() as u32).to_be_bytes());
        out.extend_from_slice(&cbor);
        Ok(out)
    }

    /// Parse a header from the front of `data`.
    ///
    /// Returns the header and the offset where the body starts.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), CryptoError> {
        let Some((prefix, rest)) = data.split_first_chunk::<4>() else {
            return Err(CryptoError::format("envelope shorter than header length"));
        };
        let len = header_len(*prefix)?;
        let Some(cbor) = rest.get(..len) else {
            return Err(CryptoError::format("envelope header truncated"));
        };
        Ok((Self::from_cbor(cbor)?, 4 + len))
    }

    /// Read a header from the front of a stream, leaving the reader at the body.
    ///
    /// Returns the header and its encoded bytes, length prefix included.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<(Self, Vec<u8>), CryptoError> {
        let mut prefix = [0u8; 4];
        reader.read_exact(&mut prefix).map_err(|e| read_error(&e))?;
        let len = header_len(prefix)?;

        let mut raw = vec![0u8; 4 + len];
        raw[..4].copy_from_slice(&prefix);
        reader.read_exact(&mut raw[4..]).map_err(|e| read_error(&e))?;
        Ok((Self::from_cbor(&raw[4..])?, raw))
    }

    /// Write the encoded header, returning the bytes written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<Vec<u8>, CryptoError> {
        let encoded = self.encode()?;
        writer.write_all(&encoded).map_err(|e| CryptoError::io("write envelope header", &e))?;
        Ok(encoded)
    }

    fn from_cbor(cbor: &[u8]) -> Result<Self, CryptoError> {
        let header: Self = ciborium::from_reader(cbor)
            .map_err(|e| CryptoError::format(format!("envelope header: {e}")))?;
        if header.version != ENVELOPE_VERSION {
            return Err(CryptoError::format(format!(
                "unsupported envelope version {}",
                header.version
            )));
        }
        if let Some(size) = header.layout.buffer_size()
            && (size == 0 || size > MAX_STREAM_BUFFER_SIZE)
        {
            return Err(CryptoError::format(format!(
                "stream buffer size {size} outside 1..={MAX_STREAM_BUFFER_SIZE}"
            )));
        }
        if header.layout != BodyLayout::Sealed && header.signature.is_some() {
            return Err(CryptoError::format("streaming envelope carries a header signature"));
        }
        Ok(header)
    }
}

fn header_len(prefix: [u8; 4]) -> Result<usize, CryptoError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_HEADER_LEN {
        return Err(CryptoError::format(format!(
            "envelope header length {len} exceeds {MAX_HEADER_LEN}"
        )));
    }
    Ok(len)
}

fn read_error(err: &std::io::Error) -> CryptoError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        CryptoError::format("envelope header truncated")
    } else {
        CryptoError::io("read envelope header", err)
    }
}

//! Multi-recipient hybrid encryption.
//!
//! One random content key (CEK) and nonce per envelope. The body is encrypted
//! once under the CEK; every recipient entry independently wraps that CEK.
//! A signature over the plaintext is encrypted under the CEK with its own
//! nonce, so only recipients learn who signed. Sealed bodies carry it in the
//! header; signed streams append it as a trailer once the digest is known.
//!
//! The body AD includes a SHA-512 digest of the encoded header, so a
//! rewritten layout, nonce or recipient list fails body authentication.

use std::io::{self, Cursor, Read, Write};

use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

use super::{
    format::{BodyLayout, ENVELOPE_VERSION, EnvelopeHeader, MAX_STREAM_BUFFER_SIZE},
    recipient::{self, CEK_LEN, PasswordKdf, Recipient},
};
use crate::{
    aead::{AES_NONCE_LEN, AES_TAG_LEN, aes_open, aes_seal, stream::StreamCipher},
    env::Environment,
    error::CryptoError,
    fingerprint::FingerprintAlgorithm,
    keys::{Ed25519PrivateKey, Ed25519PublicKey},
    signature::{self, DigestReader, DigestWriter, SIGNATURE_LEN},
};

/// AD label for every envelope body segment.
const BODY_AD: &[u8] = b"sealframe envelope body v1";

/// AD bound to the embedded signature.
const SIGNATURE_AD: &[u8] = b"sealframe envelope signature v1";

/// AD label for the signed stream trailer.
const TRAILER_AD: &[u8] = b"sealframe envelope trailer v1";

/// Encrypted signature trailer: signature plus tag.
const TRAILER_LEN: usize = SIGNATURE_LEN + AES_TAG_LEN;

/// Bytes pulled from the source per refill while withholding the trailer.
const TRAILER_READ_AHEAD: usize = 8 * 1024;

/// Multi-recipient envelope encryption.
///
/// Holds the environment for randomness plus the knobs that shape new
/// envelopes. Decryption reads the layout and password costs from the
/// envelope itself; only the fingerprint algorithm must match the sender's.
#[derive(Debug, Clone)]
pub struct EnvelopeCipher<E: Environment> {
    env: E,
    fingerprint: FingerprintAlgorithm,
    password_kdf: PasswordKdf,
    stream: StreamCipher,
}

impl<E: Environment> EnvelopeCipher<E> {
    /// Create a cipher with default settings.
    pub fn new(env: E) -> Self {
        Self {
            env,
            fingerprint: FingerprintAlgorithm::default(),
            password_kdf: PasswordKdf::default(),
            stream: StreamCipher::default(),
        }
    }

    /// Use `fingerprint` for recipient identifiers.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: FingerprintAlgorithm) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Use these Argon2 costs for new password recipients.
    #[must_use]
    pub fn with_password_kdf(mut self, password_kdf: PasswordKdf) -> Self {
        self.password_kdf = password_kdf;
        self
    }

    /// Use this segment size for new streaming envelopes.
    #[must_use]
    pub fn with_stream_cipher(mut self, stream: StreamCipher) -> Self {
        self.stream = stream;
        self
    }

    /// Encrypt `data` for every recipient.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `recipients` is empty
    /// - `InvalidKey` if any recipient key is empty or malformed
    pub fn encrypt(
        &self,
        data: &[u8],
        recipients: &[Recipient<'_>],
    ) -> Result<Vec<u8>, CryptoError> {
        self.seal(data, None, recipients)
    }

    /// Sign `data` with `signer`, then encrypt for every recipient.
    pub fn sign_then_encrypt(
        &self,
        data: &[u8],
        signer: &Ed25519PrivateKey,
        recipients: &[Recipient<'_>],
    ) -> Result<Vec<u8>, CryptoError> {
        let signature = signature::sign(data, signer)?;
        self.seal(data, Some(signature.as_slice()), recipients)
    }

    /// Decrypt an envelope with a recipient's private key.
    ///
    /// Accepts every layout, streaming ones included.
    ///
    /// # Errors
    ///
    /// - `InvalidFormat` if the header does not parse
    /// - `RecipientNotFound` if the envelope has no entry for this key
    /// - `AuthenticationFailed` if the entry, header or body does not verify
    pub fn decrypt(&self, data: &[u8], key: &Ed25519PrivateKey) -> Result<Vec<u8>, CryptoError> {
        let (header, offset) = EnvelopeHeader::decode(data)?;
        let cek = recipient::unwrap_for_key(&header.recipients, key, self.fingerprint, "decrypt")?;
        let (header_bytes, body) = data.split_at(offset);
        Ok(open_body(&header, header_bytes, &cek, body, "decrypt")?.0)
    }

    /// Decrypt an envelope with a password recipient entry.
    pub fn decrypt_with_password(
        &self,
        data: &[u8],
        password: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let (header, offset) = EnvelopeHeader::decode(data)?;
        let cek = recipient::unwrap_for_password(&header.recipients, password, "decrypt")?;
        let (header_bytes, body) = data.split_at(offset);
        Ok(open_body(&header, header_bytes, &cek, body, "decrypt")?.0)
    }

    /// Decrypt, then check the embedded signature against each verifier in
    /// order. The first key that validates wins.
    ///
    /// Sealed envelopes carry a signature over the plaintext; signed streams
    /// one over its SHA-512 digest. Both are checked here.
    ///
    /// # Errors
    ///
    /// - `SignatureVerificationFailed` if `verifiers` is empty, the envelope
    ///   is unsigned, or no verifier matches
    pub fn decrypt_then_verify(
        &self,
        data: &[u8],
        key: &Ed25519PrivateKey,
        verifiers: &[Ed25519PublicKey],
    ) -> Result<Vec<u8>, CryptoError> {
        const OP: &str = "decrypt then verify";

        if verifiers.is_empty() {
            return Err(CryptoError::SignatureVerificationFailed { operation: OP });
        }
        let (header, offset) = EnvelopeHeader::decode(data)?;
        let cek = recipient::unwrap_for_key(&header.recipients, key, self.fingerprint, OP)?;
        let (header_bytes, body) = data.split_at(offset);
        let (plaintext, embedded) = open_body(&header, header_bytes, &cek, body, OP)?;

        let Some(embedded) = embedded else {
            return Err(CryptoError::SignatureVerificationFailed { operation: OP });
        };
        match header.layout {
            BodyLayout::SignedStream { .. } => {
                verify_any(&Sha512::digest(&plaintext), &embedded, verifiers, OP)?;
            },
            BodyLayout::Sealed | BodyLayout::Stream { .. } => {
                verify_any(&plaintext, &embedded, verifiers, OP)?;
            },
        }
        Ok(plaintext)
    }

    /// Encrypt a stream for every recipient with bounded memory.
    ///
    /// Returns the number of plaintext bytes consumed.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `recipients` is empty or the configured
    ///   segment size exceeds [`MAX_STREAM_BUFFER_SIZE`]
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        recipients: &[Recipient<'_>],
    ) -> Result<u64, CryptoError> {
        let layout = BodyLayout::Stream { buffer_size: self.stream_buffer_size()? };
        let (header, cek) = self.build_header(layout, None, recipients)?;
        let header_bytes = header.write_to(writer)?;
        let ad = bound_ad(BODY_AD, &header_bytes);
        self.stream.encrypt(&cek, &header.nonce, &ad, reader, writer)
    }

    /// Encrypt a stream for every recipient and append an encrypted
    /// signature over the SHA-512 digest of the plaintext.
    ///
    /// The signature can only be computed after the last segment, so it
    /// follows the body as a fixed-size trailer. Returns the number of
    /// plaintext bytes consumed.
    pub fn sign_then_encrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        signer: &Ed25519PrivateKey,
        recipients: &[Recipient<'_>],
    ) -> Result<u64, CryptoError> {
        const OP: &str = "sign then encrypt stream";

        // Reject an unusable signer before any output is written.
        signer.signing_key(OP)?;

        let layout = BodyLayout::SignedStream { buffer_size: self.stream_buffer_size()? };
        let (header, cek) = self.build_header(layout, None, recipients)?;
        let header_bytes = header.write_to(writer)?;

        let mut digest = DigestReader::new(reader);
        let ad = bound_ad(BODY_AD, &header_bytes);
        let consumed = self.stream.encrypt(&cek, &header.nonce, &ad, &mut digest, writer)?;

        let signature = signature::sign(&digest.finalize(), signer)?;
        let trailer = aes_seal(
            &cek,
            &trailer_nonce(&header.nonce),
            &bound_ad(TRAILER_AD, &header_bytes),
            &signature,
        )?;
        writer.write_all(&trailer).map_err(|e| CryptoError::io(OP, &e))?;
        writer.flush().map_err(|e| CryptoError::io(OP, &e))?;
        Ok(consumed)
    }

    /// Decrypt a streaming (or sealed) envelope with a recipient's key.
    ///
    /// Returns the number of plaintext bytes written. Segments are written
    /// as they verify, so on error the caller must discard the output.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        key: &Ed25519PrivateKey,
    ) -> Result<u64, CryptoError> {
        const OP: &str = "decrypt stream";

        let (header, header_bytes) = EnvelopeHeader::read_from(reader)?;
        let cek = recipient::unwrap_for_key(&header.recipients, key, self.fingerprint, OP)?;
        Ok(open_stream(&header, &header_bytes, &cek, reader, writer, OP)?.0)
    }

    /// Decrypt a streaming (or sealed) envelope with a password.
    pub fn decrypt_stream_with_password<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        password: &[u8],
    ) -> Result<u64, CryptoError> {
        const OP: &str = "decrypt stream";

        let (header, header_bytes) = EnvelopeHeader::read_from(reader)?;
        let cek = recipient::unwrap_for_password(&header.recipients, password, OP)?;
        Ok(open_stream(&header, &header_bytes, &cek, reader, writer, OP)?.0)
    }

    /// Decrypt a signed stream, then check its trailer signature against
    /// each verifier in order.
    ///
    /// Plaintext reaches `writer` before the signature can be checked; on
    /// any error the caller must discard everything written.
    ///
    /// # Errors
    ///
    /// - `SignatureVerificationFailed` if `verifiers` is empty, the envelope
    ///   is not a signed stream, or no verifier matches
    pub fn decrypt_then_verify_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        key: &Ed25519PrivateKey,
        verifiers: &[Ed25519PublicKey],
    ) -> Result<u64, CryptoError> {
        const OP: &str = "decrypt then verify stream";

        if verifiers.is_empty() {
            return Err(CryptoError::SignatureVerificationFailed { operation: OP });
        }
        let (header, header_bytes) = EnvelopeHeader::read_from(reader)?;
        if !matches!(header.layout, BodyLayout::SignedStream { .. }) {
            return Err(CryptoError::SignatureVerificationFailed { operation: OP });
        }
        let cek = recipient::unwrap_for_key(&header.recipients, key, self.fingerprint, OP)?;

        let mut digest = DigestWriter::new(writer);
        let (written, embedded) =
            open_stream(&header, &header_bytes, &cek, reader, &mut digest, OP)?;
        let Some(embedded) = embedded else {
            return Err(CryptoError::SignatureVerificationFailed { operation: OP });
        };
        verify_any(&digest.finalize(), &embedded, verifiers, OP)?;
        Ok(written)
    }

    fn seal(
        &self,
        data: &[u8],
        signature: Option<&[u8]>,
        recipients: &[Recipient<'_>],
    ) -> Result<Vec<u8>, CryptoError> {
        let (header, cek) = self.build_header(BodyLayout::Sealed, signature, recipients)?;
        let mut out = header.encode()?;
        let body = aes_seal(&cek, &header.nonce, &bound_ad(BODY_AD, &out), data)?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn stream_buffer_size(&self) -> Result<u32, CryptoError> {
        let size = self.stream.buffer_size();
        if size > MAX_STREAM_BUFFER_SIZE {
            return Err(CryptoError::InvalidParameter {
                reason: format!("stream buffer size {size} exceeds {MAX_STREAM_BUFFER_SIZE}"),
            });
        }
        Ok(size as u32)
    }

    fn build_header(
        &self,
        layout: BodyLayout,
        signature: Option<&[u8]>,
        recipients: &[Recipient<'_>],
    ) -> Result<(EnvelopeHeader, Zeroizing<[u8; CEK_LEN]>), CryptoError> {
        if recipients.is_empty() {
            return Err(CryptoError::InvalidParameter { reason: "no recipients".into() });
        }
        let cek = Zeroizing::new(self.env.random_array::<CEK_LEN>()?);
        let nonce: [u8; AES_NONCE_LEN] = self.env.random_array()?;

        let entries = recipients
            .iter()
            .map(|r| recipient::wrap(&self.env, &cek, *r, self.fingerprint, self.password_kdf))
            .collect::<Result<Vec<_>, _>>()?;

        let signature = match signature {
            Some(signature) => {
                Some(aes_seal(&cek, &signature_nonce(&nonce), SIGNATURE_AD, signature)?)
            },
            None => None,
        };

        let header = EnvelopeHeader {
            version: ENVELOPE_VERSION,
            layout,
            nonce,
            recipients: entries,
            signature,
        };
        Ok((header, cek))
    }
}

/// Decrypt a fully buffered body and its signature, if any.
fn open_body(
    header: &EnvelopeHeader,
    header_bytes: &[u8],
    cek: &[u8; CEK_LEN],
    body: &[u8],
    operation: &'static str,
) -> Result<(Vec<u8>, Option<Vec<u8>>), CryptoError> {
    let mut plaintext = Vec::with_capacity(body.len());
    let (_, signature) =
        open_stream(header, header_bytes, cek, &mut Cursor::new(body), &mut plaintext, operation)?;
    Ok((plaintext, signature))
}

/// Decrypt the body from `reader` into `writer` according to its layout.
///
/// Returns the plaintext length and the decrypted signature, if the envelope
/// carries one. Streaming layouts were bounds-checked when the header parsed.
fn open_stream<R: Read, W: Write>(
    header: &EnvelopeHeader,
    header_bytes: &[u8],
    cek: &[u8; CEK_LEN],
    reader: &mut R,
    writer: &mut W,
    operation: &'static str,
) -> Result<(u64, Option<Vec<u8>>), CryptoError> {
    let ad = bound_ad(BODY_AD, header_bytes);

    match header.layout {
        BodyLayout::Sealed => {
            let mut body = Vec::new();
            reader.read_to_end(&mut body).map_err(|e| CryptoError::io(operation, &e))?;
            let plaintext = Zeroizing::new(aes_open(cek, &header.nonce, &ad, &body, operation)?);

            let signature = match &header.signature {
                Some(encrypted) => {
                    let nonce = signature_nonce(&header.nonce);
                    Some(aes_open(cek, &nonce, SIGNATURE_AD, encrypted, operation)?)
                },
                None => None,
            };
            writer.write_all(&plaintext).map_err(|e| CryptoError::io(operation, &e))?;
            writer.flush().map_err(|e| CryptoError::io(operation, &e))?;
            Ok((plaintext.len() as u64, signature))
        },
        BodyLayout::Stream { buffer_size } => {
            let written =
                segment_cipher(buffer_size)?.decrypt(cek, &header.nonce, &ad, reader, writer)?;
            Ok((written, None))
        },
        BodyLayout::SignedStream { buffer_size } => {
            let mut body = TrailerSplit::new(reader);
            let written =
                segment_cipher(buffer_size)?.decrypt(cek, &header.nonce, &ad, &mut body, writer)?;
            let Some(trailer) = body.into_trailer() else {
                return Err(CryptoError::AuthenticationFailed { operation });
            };
            let signature = aes_open(
                cek,
                &trailer_nonce(&header.nonce),
                &bound_ad(TRAILER_AD, header_bytes),
                &trailer,
                operation,
            )?;
            Ok((written, Some(signature)))
        },
    }
}

fn segment_cipher(buffer_size: u32) -> Result<StreamCipher, CryptoError> {
    StreamCipher::new(buffer_size as usize)
        .map_err(|_| CryptoError::format(format!("stream buffer size {buffer_size}")))
}

fn verify_any(
    message: &[u8],
    signature: &[u8],
    verifiers: &[Ed25519PublicKey],
    operation: &'static str,
) -> Result<(), CryptoError> {
    if verifiers.iter().any(|verifier| signature::verify(message, signature, verifier).is_ok()) {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerificationFailed { operation })
    }
}

/// `label || SHA-512(encoded header)`.
fn bound_ad(label: &[u8], header_bytes: &[u8]) -> Vec<u8> {
    let mut ad = Vec::with_capacity(label.len() + 64);
    ad.extend_from_slice(label);
    ad.extend_from_slice(&Sha512::digest(header_bytes));
    ad
}

// Segment nonces only touch bytes 3..12, so flipping high bits of byte 0
// keeps the signature and trailer nonces distinct from every segment.
fn signature_nonce(nonce: &[u8; AES_NONCE_LEN]) -> [u8; AES_NONCE_LEN] {
    let mut out = *nonce;
    out[0] ^= 0x80;
    out
}

fn trailer_nonce(nonce: &[u8; AES_NONCE_LEN]) -> [u8; AES_NONCE_LEN] {
    let mut out = *nonce;
    out[0] ^= 0x40;
    out
}

/// Reader that withholds the final [`TRAILER_LEN`] bytes of its source.
///
/// Buffers at most one read-ahead block beyond the trailer.
struct TrailerSplit<'a, R> {
    inner: &'a mut R,
    held: Vec<u8>,
    eof: bool,
}

impl<'a, R: Read> TrailerSplit<'a, R> {
    fn new(inner: &'a mut R) -> Self {
        Self { inner, held: Vec::with_capacity(TRAILER_LEN + TRAILER_READ_AHEAD), eof: false }
    }

    /// The withheld trailer, if the source ended with exactly one.
    fn into_trailer(self) -> Option<Vec<u8>> {
        (self.eof && self.held.len() == TRAILER_LEN).then_some(self.held)
    }
}

impl<R: Read> Read for TrailerSplit<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.held.len() <= TRAILER_LEN && !self.eof {
            let start = self.held.len();
            self.held.resize(start + TRAILER_READ_AHEAD, 0);
            match self.inner.read(&mut self.held[start..]) {
                Ok(n) => {
                    self.held.truncate(start + n);
                    self.eof = n == 0;
                },
                Err(e) => {
                    self.held.truncate(start);
                    if e.kind() != io::ErrorKind::Interrupted {
                        return Err(e);
                    }
                },
            }
        }

        let n = self.held.len().saturating_sub(TRAILER_LEN).min(buf.len());
        buf[..n].copy_from_slice(&self.held[..n]);
        self.held.drain(..n);
        Ok(n)
    }
}

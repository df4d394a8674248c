//! Detached Ed25519 signatures over byte slices and streams.
//!
//! Stream signatures sign the SHA-512 digest of everything the reader yields,
//! so the signer never holds more than one read buffer in memory.

use std::io::{self, Read, Write};

use ed25519_dalek::{Signature, Signer, Verifier};
use sha2::{Digest, Sha512};

use crate::{
    error::CryptoError,
    keys::{Ed25519PrivateKey, Ed25519PublicKey},
};

/// Ed25519 signature length.
pub const SIGNATURE_LEN: usize = 64;

const STREAM_READ_BUFFER: usize = 8 * 1024;

/// Sign `data`.
pub fn sign(data: &[u8], key: &Ed25519PrivateKey) -> Result<[u8; SIGNATURE_LEN], CryptoError> {
    let signing = key.signing_key("sign")?;
    Ok(signing.sign(data).to_bytes())
}

/// Verify a detached signature over `data`.
pub fn verify(data: &[u8], signature: &[u8], key: &Ed25519PublicKey) -> Result<(), CryptoError> {
    let verifying = key.verifying_key("verify")?;
    let signature = parse_signature(signature, "verify")?;
    verifying
        .verify(data, &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed { operation: "verify" })
}

/// Sign the SHA-512 digest of a stream.
pub fn sign_stream<R: Read>(
    reader: &mut R,
    key: &Ed25519PrivateKey,
) -> Result<[u8; SIGNATURE_LEN], CryptoError> {
    let signing = key.signing_key("sign stream")?;
    let digest = digest_stream(reader, "sign stream")?;
    Ok(signing.sign(&digest).to_bytes())
}

/// Verify a stream signature produced by [`sign_stream`].
pub fn verify_stream<R: Read>(
    reader: &mut R,
    signature: &[u8],
    key: &Ed25519PublicKey,
) -> Result<(), CryptoError> {
    let verifying = key.verifying_key("verify stream")?;
    let signature = parse_signature(signature, "verify stream")?;
    let digest = digest_stream(reader, "verify stream")?;
    verifying
        .verify(&digest, &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed { operation: "verify stream" })
}

/// Reader adapter that feeds everything it yields into a SHA-512 digest.
pub(crate) struct DigestReader<'a, R> {
    inner: &'a mut R,
    hasher: Sha512,
}

impl<'a, R: Read> DigestReader<'a, R> {
    pub(crate) fn new(inner: &'a mut R) -> Self {
        Self { inner, hasher: Sha512::new() }
    }

    pub(crate) fn finalize(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl<R: Read> Read for DigestReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Writer adapter that feeds everything written into a SHA-512 digest.
pub(crate) struct DigestWriter<'a, W> {
    inner: &'a mut W,
    hasher: Sha512,
}

impl<'a, W: Write> DigestWriter<'a, W> {
    pub(crate) fn new(inner: &'a mut W) -> Self {
        Self { inner, hasher: Sha512::new() }
    }

    pub(crate) fn finalize(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl<W: Write> Write for DigestWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn parse_signature(bytes: &[u8], operation: &'static str) -> Result<Signature, CryptoError> {
    // A malformed signature cannot verify; report it the same as a mismatch.
    let Ok(bytes) = <[u8; SIGNATURE_LEN]>::try_from(bytes) else {
        return Err(CryptoError::SignatureVerificationFailed { operation });
    };
    Ok(Signature::from_bytes(&bytes))
}

fn digest_stream<R: Read>(reader: &mut R, operation: &'static str) -> Result<Vec<u8>, CryptoError> {
    let mut digest = DigestReader::new(reader);
    let mut buffer = vec![0u8; STREAM_READ_BUFFER];
    loop {
        match digest.read(&mut buffer) {
            Ok(0) => break,
            Ok(_) => {},
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(CryptoError::io(operation, &e)),
        }
    }
    Ok(digest.finalize())
}

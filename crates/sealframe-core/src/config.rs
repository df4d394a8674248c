//! Facade configuration.

use std::{fmt, sync::Arc};

use sealframe_crypto::{
    ChunkCipher, CryptoError, FingerprintAlgorithm, PasswordKdf, StreamCipher,
    aead::{chunk::DEFAULT_CHUNK_SIZE, stream::DEFAULT_BUFFER_SIZE},
    envelope::MAX_STREAM_BUFFER_SIZE,
};

use crate::diagnostics::DiagnosticSink;

/// Facade configuration.
#[derive(Clone)]
pub struct CryptoConfig {
    /// Hash used for fingerprints and recipient identifiers
    pub fingerprint: FingerprintAlgorithm,

    /// Segment size for streaming encryption (envelope bodies and
    /// `stream_encrypt`), at most [`MAX_STREAM_BUFFER_SIZE`]
    pub stream_buffer_size: usize,

    /// Chunk size for `chunk_encrypt`, and the largest chunk
    /// `chunk_decrypt` accepts
    pub chunk_size: usize,

    /// Argon2id costs for password recipients
    pub password_kdf: PasswordKdf,

    /// Where operation outcomes are reported. `None` disables diagnostics.
    pub diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintAlgorithm::default(),
            stream_buffer_size: DEFAULT_BUFFER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            password_kdf: PasswordKdf::default(),
            diagnostics: None,
        }
    }
}

impl CryptoConfig {
    /// Report outcomes to `sink`.
    #[must_use]
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Build the segment ciphers these sizes describe.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if either size is zero or too large for a
    ///   32-bit length prefix, or the stream size exceeds what envelope
    ///   decoders accept
    pub fn ciphers(&self) -> Result<(StreamCipher, ChunkCipher), CryptoError> {
        if self.stream_buffer_size > MAX_STREAM_BUFFER_SIZE {
            return Err(CryptoError::InvalidParameter {
                reason: format!(
                    "stream buffer size {} exceeds {MAX_STREAM_BUFFER_SIZE}",
                    self.stream_buffer_size
                ),
            });
        }
        Ok((StreamCipher::new(self.stream_buffer_size)?, ChunkCipher::new(self.chunk_size)?))
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("fingerprint", &self.fingerprint)
            .field("stream_buffer_size", &self.stream_buffer_size)
            .field("chunk_size", &self.chunk_size)
            .field("password_kdf", &self.password_kdf)
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

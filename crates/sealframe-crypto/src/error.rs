//! Error types for Sealframe cryptographic operations.
//!
//! Every variant is terminal. Cryptographic failures are never transient, so
//! nothing here is worth retrying with the same inputs. Errors name the
//! operation that failed and, where one applies, the key identifier involved.
//! They never carry key material or plaintext.

use thiserror::Error;

/// Errors from envelope, stream, session and key operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key argument resolves to an algorithm this engine does not implement
    #[error("{operation}: unsupported key type {algorithm}")]
    UnsupportedKeyType {
        /// Operation that rejected the key
        operation: &'static str,
        /// Algorithm name or tag of the rejected key
        algorithm: String,
    },

    /// Key is empty, malformed, or not a valid curve point
    #[error("{operation}: invalid key: {reason}")]
    InvalidKey {
        /// Operation that rejected the key
        operation: &'static str,
        /// Why the key was rejected
        reason: String,
    },

    /// AEAD tag mismatch (tampering, wrong key, truncation, reordering)
    #[error("{operation}: authentication failed")]
    AuthenticationFailed {
        /// Operation whose authentication check failed
        operation: &'static str,
    },

    /// No envelope entry matches the decrypting key
    #[error("recipient not found: {key_id}")]
    RecipientNotFound {
        /// Hex identifier of the key that was looked up
        key_id: String,
    },

    /// No candidate key validates the signature
    #[error("{operation}: signature verification failed")]
    SignatureVerificationFailed {
        /// Operation that verified the signature
        operation: &'static str,
    },

    /// Entropy source failed
    #[error("random source failure: {reason}")]
    RandomSource {
        /// Underlying error from the entropy source
        reason: String,
    },

    /// Encoded data (envelope, key, snapshot) could not be parsed
    #[error("invalid format: {reason}")]
    InvalidFormat {
        /// What was malformed
        reason: String,
    },

    /// Caller-supplied parameter is out of range
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// What was out of range
        reason: String,
    },

    /// Reader or writer supplied by the caller failed
    #[error("{operation}: i/o error: {reason}")]
    Io {
        /// Operation that was reading or writing
        operation: &'static str,
        /// Underlying I/O error
        reason: String,
    },
}

impl CryptoError {
    /// Returns true if this error means the input did not authenticate.
    ///
    /// Covers AEAD failures and signature failures. Callers that must not
    /// distinguish tampering from a wrong key should treat all of these the
    /// same way.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::SignatureVerificationFailed { .. })
    }

    pub(crate) fn invalid_key(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidKey { operation, reason: reason.into() }
    }

    pub(crate) fn io(operation: &'static str, err: &std::io::Error) -> Self {
        Self::Io { operation, reason: err.to_string() }
    }

    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aead_and_signature_failures_are_authentication_failures() {
        let failed = CryptoError::AuthenticationFailed { operation: "decrypt" };
        assert!(failed.is_authentication_failure());
        assert!(
            CryptoError::SignatureVerificationFailed { operation: "verify" }
                .is_authentication_failure()
        );
    }

    #[test]
    fn lookup_failures_are_not_authentication_failures() {
        let missing = CryptoError::RecipientNotFound { key_id: "00".into() };
        assert!(!missing.is_authentication_failure());
        assert!(!CryptoError::invalid_key("encrypt", "empty").is_authentication_failure());
    }

    #[test]
    fn error_display() {
        let err = CryptoError::RecipientNotFound { key_id: "a1b2".to_string() };
        assert_eq!(err.to_string(), "recipient not found: a1b2");

        let err = CryptoError::UnsupportedKeyType {
            operation: "encrypt",
            algorithm: "rsa-2048".to_string(),
        };
        assert_eq!(err.to_string(), "encrypt: unsupported key type rsa-2048");
    }
}

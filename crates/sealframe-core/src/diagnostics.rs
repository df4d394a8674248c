//! Diagnostic events emitted by the facade.
//!
//! The facade never logs through a global logger. When a
//! [`CryptoConfig`](crate::CryptoConfig) carries a sink, each operation
//! reports its outcome to it. Events name the operation and, where one is
//! known, the key identifier; they never carry key material or plaintext.

use std::fmt;

use sealframe_crypto::KeyId;

/// Log level for diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Debug-level message
    Debug,
    /// Info-level message
    Info,
    /// Warning message
    Warn,
    /// Error message
    Error,
}

/// One facade event.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticEvent<'a> {
    /// Severity
    pub level: LogLevel,
    /// Facade operation name
    pub operation: &'static str,
    /// Identifier of the key involved, if any
    pub key_id: Option<&'a KeyId>,
    /// Human-readable outcome
    pub message: &'a str,
}

/// Receiver for facade diagnostics.
pub trait DiagnosticSink: fmt::Debug + Send + Sync {
    /// Record one event. Must not block for long; it runs inline with the
    /// operation.
    fn record(&self, event: &DiagnosticEvent<'_>);
}

/// Forwards events to `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: &DiagnosticEvent<'_>) {
        let operation = event.operation;
        let key_id = event.key_id.map(ToString::to_string).unwrap_or_default();
        let message = event.message;

        match event.level {
            LogLevel::Debug => tracing::debug!(operation, key_id, "{}", message),
            LogLevel::Info => tracing::info!(operation, key_id, "{}", message),
            LogLevel::Warn => tracing::warn!(operation, key_id, "{}", message),
            LogLevel::Error => tracing::error!(operation, key_id, "{}", message),
        }
    }
}

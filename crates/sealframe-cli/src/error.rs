//! CLI error type.

use std::{io, path::PathBuf};

use sealframe_core::CryptoError;
use thiserror::Error;

/// Failure of one CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Cryptographic operation failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Reading or writing a file failed
    #[error("{}: {source}", path.display())]
    File {
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Writing to stdout failed
    #[error("stdout: {0}")]
    Stdout(#[source] io::Error),

    /// Arguments parse but cannot be acted on
    #[error("{reason}")]
    Usage {
        /// What is wrong
        reason: String,
    },
}

impl CliError {
    pub(crate) fn file(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::File { path, source }
    }
}

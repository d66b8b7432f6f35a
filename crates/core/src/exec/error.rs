//! Error types for the process runner.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while launching or reading a process.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program binary could not be found or executed.
    #[error("Binary not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// A temp file for the output buffer could not be created.
    #[error("Failed to create temp file in {dir}: {source}")]
    TempFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The host shell itself could not be started.
    #[error("Failed to launch shell `{shell}`: {source}")]
    Launch {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    /// `run` was called twice on the same handle.
    #[error("Process has already been started")]
    AlreadyStarted,

    /// Inline buffers only exist for blocking runs.
    #[error("Inline output buffers require blocking execution")]
    InlineRequiresBlocking,

    /// No progress handler is registered for the strategy.
    #[error("No progress handler registered for strategy `{strategy}`")]
    NoHandler { strategy: String },

    /// The portable id could not be decoded.
    #[error("Invalid portable id: {reason}")]
    InvalidPortableId { reason: String },

    /// I/O error while reading the buffer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Creates a new invalid portable id error.
    pub fn invalid_portable_id(reason: impl Into<String>) -> Self {
        Self::InvalidPortableId {
            reason: reason.into(),
        }
    }
}

//! Error types for the process handle.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::command::CommandError;
use crate::exec::ExecError;

/// Errors surfaced by [`super::FfmpegProcess`].
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("Process has already been executed")]
    AlreadyExecuted,

    #[error("Process has not been executed yet")]
    NotExecuted,

    /// Results were requested before the completion marker was seen.
    #[error("Process has not completed yet")]
    NotCompleted,

    /// ffmpeg exited non-zero.
    #[error("ffmpeg failed (exit code {code:?}): {message}")]
    ToolFailed { code: Option<i32>, message: String },

    /// ffmpeg was stopped by a known signal.
    #[error("ffmpeg was interrupted by signal {signal}: {reason}")]
    Interrupted { signal: i32, reason: String },

    /// An output is missing or empty after a successful run.
    #[error("Output {path} is invalid: {reason}")]
    OutputInvalid { path: PathBuf, reason: String },

    /// The poll loop gave up before the process completed.
    #[error("Process did not complete within {0:?}")]
    PollTimeout(Duration),
}

impl ProcessError {
    pub fn output_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OutputInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

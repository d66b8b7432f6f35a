//! Error types for command assembly.

use thiserror::Error;

/// Errors raised while turning options into a command line.
///
/// These indicate a gap in the option table or a malformed value handed in by
/// the caller's code; they are never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The option has no mapping to a command-line flag.
    #[error("No command-line flag is mapped for option `{option}`")]
    UnknownOption { option: String },

    /// The value shape does not fit the option's flag template.
    #[error("Invalid value for option `{option}`: {reason}")]
    InvalidValue { option: String, reason: String },

    /// The invocation has nothing to run.
    #[error("Invalid invocation: {reason}")]
    InvalidInvocation { reason: String },
}

impl CommandError {
    /// Creates a new invalid value error.
    pub fn invalid_value(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

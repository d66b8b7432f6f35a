//! Process handle: one ffmpeg invocation with its inputs, outputs,
//! progress observers and final validation.

mod error;
mod ffmpeg;
mod outputs;
pub(crate) mod signal;

pub use error::ProcessError;
pub use ffmpeg::{FfmpegProcess, ProcessState, ProgressCallback, ToolMessage};
pub use outputs::{OutputProblem, OutputReport};
pub use signal::Termination;

//! Drive the ffmpeg command-line tool as a subprocess and track its
//! progress.
//!
//! [`command`] builds invocations, [`exec`] launches them through the host
//! shell with boundary markers, [`process`] wraps one ffmpeg run and
//! [`progress`] turns its output into [`ProgressRecord`]s. [`Toolkit`] ties
//! them to a [`Config`].

pub mod capabilities;
pub mod command;
pub mod config;
pub mod exec;
pub mod metrics;
pub mod process;
pub mod progress;
pub mod testing;
pub mod toolkit;

pub use capabilities::{Capabilities, CapabilityCache};
pub use command::{
    CommandAssembler, CommandError, CommandLine, CommandTable, Invocation, InvocationBuilder,
    OptionValue, Platform,
};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, ProgressStrategy,
};
pub use exec::{BufferMode, ExecError, ExecutionHandle, ProcessRunner};
pub use process::{FfmpegProcess, OutputReport, ProcessError, ProcessState};
pub use progress::{
    HandlerRegistry, NativeProgress, ProgressHandler, ProgressRecord, ProgressSource,
    ProgressStatus, StderrProgress,
};
pub use toolkit::Toolkit;

//! Trait definitions for progress observers.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::ProgressRecord;
use crate::command::CommandLine;
use crate::exec::{ExecError, ExecutionHandle};

/// A refreshable view of one running job.
#[async_trait]
pub trait ProgressSource: Send {
    /// Re-reads the job's output.
    async fn refresh(&mut self) -> Result<(), ExecError>;

    /// Output as last read, markers included.
    fn raw_buffer(&self) -> &str;

    /// Output as last read, markers stripped.
    fn buffer(&self) -> String;

    fn is_started(&self) -> bool;
    fn is_completed(&self) -> bool;
    fn has_error(&self) -> bool;
    fn error_code(&self) -> Option<i32>;
    fn run_time(&self) -> Duration;
    fn input_files(&self) -> Vec<PathBuf>;
    fn output_files(&self) -> Vec<PathBuf>;

    /// The `-progress` sidecar file, if the job writes one.
    fn progress_file(&self) -> Option<&Path>;

    /// The file holding the job's output, if it is file backed.
    fn buffer_file(&self) -> Option<&Path>;
}

/// A strategy that turns a job's output into [`ProgressRecord`]s.
#[async_trait]
pub trait ProgressHandler: Send {
    /// Short strategy name, used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Extra commands the strategy needs on the invocation.
    fn commands(&self) -> CommandLine {
        CommandLine::new()
    }

    /// Sidecar file the strategy reads.
    fn progress_file(&self) -> Option<&Path> {
        None
    }

    /// Hands the sidecar over to the process that will run with it.
    ///
    /// Returns `true` when the handler owned the file; from then on the
    /// process removes it with its other temp files.
    fn release_progress_file(&mut self) -> bool {
        false
    }

    /// Reads the source and returns the current progress.
    ///
    /// When `wait_before_next` is set the probe sleeps for `interval` first,
    /// unless the record is already frozen.
    async fn probe(
        &mut self,
        source: &mut dyn ProgressSource,
        wait_before_next: bool,
        interval: Duration,
    ) -> Result<ProgressRecord, ExecError>;
}

#[async_trait]
impl ProgressSource for ExecutionHandle {
    async fn refresh(&mut self) -> Result<(), ExecError> {
        ExecutionHandle::refresh(self).await
    }

    fn raw_buffer(&self) -> &str {
        ExecutionHandle::raw_buffer(self)
    }

    fn buffer(&self) -> String {
        ExecutionHandle::buffer(self)
    }

    fn is_started(&self) -> bool {
        ExecutionHandle::is_started(self)
    }

    fn is_completed(&self) -> bool {
        ExecutionHandle::is_completed(self)
    }

    fn has_error(&self) -> bool {
        ExecutionHandle::has_error(self)
    }

    fn error_code(&self) -> Option<i32> {
        ExecutionHandle::error_code(self)
    }

    fn run_time(&self) -> Duration {
        self.runtime()
    }

    fn input_files(&self) -> Vec<PathBuf> {
        self.invocation().inputs().to_vec()
    }

    fn output_files(&self) -> Vec<PathBuf> {
        self.invocation()
            .outputs()
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }

    fn progress_file(&self) -> Option<&Path> {
        ExecutionHandle::progress_file(self)
    }

    fn buffer_file(&self) -> Option<&Path> {
        self.buffer_path()
    }
}

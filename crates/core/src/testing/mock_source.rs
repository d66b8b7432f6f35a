//! Scripted progress source for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exec::ExecError;
use crate::progress::ProgressSource;

/// In-memory [`ProgressSource`] whose output and exit state are set by the
/// test.
///
/// # Example
///
/// ```rust,ignore
/// use ffwrap_core::testing::MockSource;
///
/// let mut source = MockSource::new();
/// source.start().push_output("frame=1 fps=0 q=0.0 size=0kB time=00:00:00.04 bitrate=0kbits/s\r");
/// let record = handler.probe(&mut source, false, Duration::ZERO).await?;
/// ```
#[derive(Debug, Default)]
pub struct MockSource {
    output: String,
    started: bool,
    completed: bool,
    exit_code: Option<i32>,
    run_time: Duration,
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    progress_file: Option<PathBuf>,
    buffer_file: Option<PathBuf>,
    /// Outputs released one per refresh.
    pending: Vec<String>,
    refreshes: usize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) -> &mut Self {
        self.started = true;
        self
    }

    /// Appends to the visible output right away.
    pub fn push_output(&mut self, text: &str) -> &mut Self {
        self.output.push_str(text);
        self
    }

    /// Queues output that becomes visible on the next refresh.
    pub fn queue_output(&mut self, text: &str) -> &mut Self {
        self.pending.push(text.to_string());
        self
    }

    /// Marks the process as exited; `Some(code)` means it failed.
    pub fn complete(&mut self, exit_code: Option<i32>) -> &mut Self {
        self.completed = true;
        self.exit_code = exit_code;
        self
    }

    pub fn set_run_time(&mut self, run_time: Duration) -> &mut Self {
        self.run_time = run_time;
        self
    }

    pub fn set_files(&mut self, inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) -> &mut Self {
        self.inputs = inputs;
        self.outputs = outputs;
        self
    }

    pub fn set_progress_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.progress_file = Some(path.into());
        self
    }

    pub fn set_buffer_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.buffer_file = Some(path.into());
        self
    }

    /// Number of times [`ProgressSource::refresh`] was called.
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }
}

#[async_trait]
impl ProgressSource for MockSource {
    async fn refresh(&mut self) -> Result<(), ExecError> {
        self.refreshes += 1;
        if !self.pending.is_empty() {
            let next = self.pending.remove(0);
            self.output.push_str(&next);
        }
        Ok(())
    }

    fn raw_buffer(&self) -> &str {
        &self.output
    }

    fn buffer(&self) -> String {
        self.output.clone()
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn has_error(&self) -> bool {
        self.completed && self.exit_code.is_some()
    }

    fn error_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn run_time(&self) -> Duration {
        self.run_time
    }

    fn input_files(&self) -> Vec<PathBuf> {
        self.inputs.clone()
    }

    fn output_files(&self) -> Vec<PathBuf> {
        self.outputs.clone()
    }

    fn progress_file(&self) -> Option<&Path> {
        self.progress_file.as_deref()
    }

    fn buffer_file(&self) -> Option<&Path> {
        self.buffer_file.as_deref()
    }
}

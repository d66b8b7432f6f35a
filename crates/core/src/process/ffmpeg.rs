//! One ffmpeg invocation and its lifecycle.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::ProcessError;
use super::outputs::{self, OutputReport};
use super::signal::{self, Termination};
use crate::command::{CommandLine, InvocationBuilder};
use crate::exec::{BufferMode, ExecError, ExecutionHandle, ProcessRunner};
use crate::metrics;
use crate::progress::{tracker, ProgressHandler, ProgressRecord, ProgressSource};

/// Called with every record an attached handler produces.
pub type ProgressCallback = Box<dyn FnMut(&ProgressRecord) + Send>;

/// Lifecycle of an [`FfmpegProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Created,
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Created => "created",
            ProcessState::Running => "running",
            ProcessState::Completed => "completed",
            ProcessState::Failed => "failed",
            ProcessState::Interrupted => "interrupted",
        }
    }
}

/// A `[component @ 0xaddr] text` diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMessage {
    pub component: String,
    pub address: String,
    pub text: String,
}

struct Observer {
    handler: Box<dyn ProgressHandler>,
    callback: Option<ProgressCallback>,
}

/// Builds, runs and tracks one ffmpeg invocation.
///
/// Inputs and outputs are added first, then [`FfmpegProcess::execute`]
/// launches the process. With progress handlers attached, a non-blocking
/// execution polls until the process completes and feeds every record to
/// the handlers' callbacks.
pub struct FfmpegProcess {
    builder: InvocationBuilder,
    runner: ProcessRunner,
    mode: BufferMode,
    observers: Vec<Observer>,
    handle: Option<ExecutionHandle>,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
    completed: Option<Vec<OutputReport>>,
    finish_recorded: bool,
}

impl FfmpegProcess {
    pub fn new(runner: ProcessRunner, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            builder: InvocationBuilder::new(ffmpeg),
            runner,
            mode: BufferMode::default(),
            observers: Vec::new(),
            handle: None,
            poll_interval: Duration::from_secs(1),
            poll_timeout: None,
            completed: None,
            finish_recorded: false,
        }
    }

    /// Wraps a handle that is already running, e.g. one rebuilt from a
    /// portable id.
    pub fn from_handle(runner: ProcessRunner, handle: ExecutionHandle) -> Self {
        let mut process = Self::new(runner, handle.invocation().program().to_path_buf());
        process.handle = Some(handle);
        process
    }

    /// Sets the poll cadence and an optional upper bound for the poll loop.
    pub fn with_polling(mut self, interval: Duration, timeout: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    pub fn add_pre_input_command(&mut self, flag: &str, value: Option<&str>) -> &mut Self {
        self.builder.add_pre_input(flag, value);
        self
    }

    pub fn add_input(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.builder.input(path);
        self
    }

    pub fn add_input_with(&mut self, path: impl Into<PathBuf>, commands: CommandLine) -> &mut Self {
        self.builder.input_with(path, commands);
        self
    }

    /// Adds an output with its commands; returns the output index.
    pub fn add_output(&mut self, path: impl Into<PathBuf>, commands: CommandLine) -> usize {
        self.builder.output(path, commands)
    }

    pub fn add_post_output_command(&mut self, flag: &str, value: Option<&str>) -> &mut Self {
        self.builder.add_post_output(flag, value);
        self
    }

    pub fn set_buffer_mode(&mut self, mode: BufferMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Attaches a progress handler; its commands join the pre-input
    /// commands. Must be called before [`FfmpegProcess::execute`].
    pub fn attach(
        &mut self,
        handler: Box<dyn ProgressHandler>,
        callback: Option<ProgressCallback>,
    ) -> Result<&mut Self, ProcessError> {
        if self.handle.is_some() {
            return Err(ProcessError::AlreadyExecuted);
        }
        self.builder.pre_input(&handler.commands());
        debug!(handler = handler.name(), "Attached progress handler");
        self.observers.push(Observer { handler, callback });
        Ok(self)
    }

    /// Launches the process.
    ///
    /// Blocking runs return once ffmpeg has exited, after one final probe.
    /// Non-blocking runs with handlers attached poll until completion (or
    /// the poll timeout); without handlers they return straight away.
    pub async fn execute(&mut self, blocking: bool) -> Result<(), ProcessError> {
        if self.handle.is_some() {
            return Err(ProcessError::AlreadyExecuted);
        }

        let invocation = self.builder.build()?;
        let mut handle = self.runner.prepare(invocation, self.mode.clone())?;
        for observer in &mut self.observers {
            if let Some(path) = observer.handler.progress_file().map(Path::to_path_buf) {
                let temporary = observer.handler.release_progress_file();
                handle.set_progress_file(path, temporary);
            }
        }
        self.runner.run(&mut handle, blocking).await?;
        self.handle = Some(handle);

        if blocking {
            self.notify(false).await?;
        } else if !self.observers.is_empty() {
            self.poll_until_complete().await?;
        }
        self.record_finish();
        Ok(())
    }

    /// Polls the buffer until the process completes.
    ///
    /// Bounded by the poll timeout when one is set; without it a process
    /// whose shell died before writing markers is polled forever.
    pub async fn wait_until_complete(&mut self) -> Result<(), ProcessError> {
        let started = Instant::now();
        loop {
            let handle = self.handle.as_mut().ok_or(ProcessError::NotExecuted)?;
            handle.refresh().await?;
            if handle.is_completed() {
                break;
            }
            self.check_timeout(started)?;
            tokio::time::sleep(self.poll_interval).await;
        }
        self.record_finish();
        Ok(())
    }

    async fn poll_until_complete(&mut self) -> Result<(), ProcessError> {
        let started = Instant::now();
        loop {
            self.notify(true).await?;
            if self.is_completed() {
                return Ok(());
            }
            self.check_timeout(started)?;
        }
    }

    fn check_timeout(&self, started: Instant) -> Result<(), ProcessError> {
        match self.poll_timeout {
            Some(timeout) if started.elapsed() >= timeout => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Gave up polling process");
                Err(ProcessError::PollTimeout(timeout))
            }
            _ => Ok(()),
        }
    }

    /// Probes every handler once; only the first one sleeps.
    async fn notify(&mut self, wait: bool) -> Result<(), ProcessError> {
        let handle = self.handle.as_mut().ok_or(ProcessError::NotExecuted)?;
        let interval = self.poll_interval;
        for (i, observer) in self.observers.iter_mut().enumerate() {
            let record = observer
                .handler
                .probe(&mut *handle, wait && i == 0, interval)
                .await?;
            if let Some(callback) = observer.callback.as_mut() {
                callback(&record);
            }
        }
        Ok(())
    }

    fn record_finish(&mut self) {
        if self.finish_recorded {
            return;
        }
        let Some(handle) = self.handle.as_ref() else {
            return;
        };
        if !handle.is_completed() {
            return;
        }
        self.finish_recorded = true;

        let state = self.state();
        let runtime = handle.runtime();
        metrics::PROCESSES_FINISHED
            .with_label_values(&[state.as_str()])
            .inc();
        metrics::PROCESS_DURATION
            .with_label_values(&[state.as_str()])
            .observe(runtime.as_secs_f64());
        info!(
            id = %handle.markers().id(),
            state = state.as_str(),
            exit_code = ?handle.error_code(),
            runtime_ms = runtime.as_millis() as u64,
            "Process finished"
        );
    }

    pub fn state(&self) -> ProcessState {
        let Some(handle) = self.handle.as_ref() else {
            return ProcessState::Created;
        };
        if !handle.is_completed() {
            ProcessState::Running
        } else if !handle.has_error() {
            ProcessState::Completed
        } else {
            match signal::classify(&handle.buffer()) {
                Some(Termination::Known { .. }) => ProcessState::Interrupted,
                _ => ProcessState::Failed,
            }
        }
    }

    pub fn handle(&self) -> Option<&ExecutionHandle> {
        self.handle.as_ref()
    }

    pub fn runtime(&self) -> Duration {
        self.handle
            .as_ref()
            .map(ExecutionHandle::runtime)
            .unwrap_or_default()
    }

    /// Output as last read, markers stripped.
    pub fn output(&self) -> String {
        self.handle
            .as_ref()
            .map(ExecutionHandle::buffer)
            .unwrap_or_default()
    }

    /// Last non-empty `\n` separated line.
    pub fn last_line(&self) -> Option<String> {
        self.output()
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .last()
            .map(|line| line.rsplit('\r').next().unwrap_or(line).to_string())
    }

    /// Last non-empty chunk split on `\r` or `\n`; ffmpeg rewrites its
    /// status line with `\r`.
    pub fn last_split(&self) -> Option<String> {
        self.output()
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .last()
            .map(str::to_string)
    }

    /// Lines shaped like `[component @ 0xaddr] text`.
    pub fn messages(&self) -> Vec<ToolMessage> {
        let Ok(re) = Regex::new(r"^\[(\S+) @ (\S+)\]\s*(.*)$") else {
            return Vec::new();
        };
        self.output()
            .split(['\r', '\n'])
            .filter_map(|line| {
                let caps = re.captures(line.trim())?;
                Some(ToolMessage {
                    component: caps.get(1)?.as_str().to_string(),
                    address: caps.get(2)?.as_str().to_string(),
                    text: caps.get(3)?.as_str().to_string(),
                })
            })
            .collect()
    }

    /// Validates the finished process and its outputs.
    ///
    /// The first successful result is kept and returned as is by later
    /// calls.
    pub async fn complete_process(&mut self) -> Result<Vec<OutputReport>, ProcessError> {
        if let Some(ref completed) = self.completed {
            return Ok(completed.clone());
        }

        let handle = self.handle.as_mut().ok_or(ProcessError::NotExecuted)?;
        handle.refresh().await?;
        if !handle.is_completed() {
            return Err(ProcessError::NotCompleted);
        }
        let outputs = handle.invocation().outputs().to_vec();
        let failure = if handle.has_error() {
            let buffer = handle.buffer();
            Some(match signal::classify(&buffer) {
                Some(Termination::Known { signal, reason }) => ProcessError::Interrupted {
                    signal,
                    reason: reason.to_string(),
                },
                Some(unknown) => ProcessError::ToolFailed {
                    code: handle.error_code(),
                    message: unknown.message(),
                },
                None => ProcessError::ToolFailed {
                    code: handle.error_code(),
                    message: tracker::error_message(&buffer).unwrap_or_default(),
                },
            })
        } else {
            None
        };
        self.record_finish();
        if let Some(failure) = failure {
            return Err(failure);
        }

        let reports = outputs::inspect_all(&outputs)
            .await
            .map_err(ExecError::Io)?;
        if let Some(bad) = reports.iter().find(|r| !r.is_valid()) {
            metrics::OUTPUT_VALIDATION_FAILURES.inc();
            let reason = bad
                .problem
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            warn!(path = %bad.offending_path().display(), reason = %reason, "Output failed validation");
            return Err(ProcessError::output_invalid(bad.offending_path(), reason));
        }

        self.completed = Some(reports.clone());
        Ok(reports)
    }

    /// Per-output view of what is on disk right now, without failing on
    /// missing or empty outputs.
    pub async fn output_report(&self) -> Result<Vec<OutputReport>, ProcessError> {
        let handle = self.handle.as_ref().ok_or(ProcessError::NotExecuted)?;
        Ok(outputs::inspect_all(handle.invocation().outputs())
            .await
            .map_err(ExecError::Io)?)
    }

    /// Removes the temp files behind the process.
    pub fn delete_output(&mut self) -> Result<(), ProcessError> {
        if let Some(handle) = self.handle.as_mut() {
            handle.delete_output()?;
        }
        Ok(())
    }

    /// Keeps the temp files after the process is dropped.
    pub fn disable_gc(&mut self) -> Result<(), ProcessError> {
        self.handle
            .as_mut()
            .ok_or(ProcessError::NotExecuted)?
            .disable_gc();
        Ok(())
    }

    /// Opaque id for resuming polling elsewhere; disables GC so the buffer
    /// outlives this process object.
    pub fn portable_id(&mut self) -> Result<String, ProcessError> {
        let handle = self.handle.as_mut().ok_or(ProcessError::NotExecuted)?;
        let id = handle.portable_id()?;
        handle.disable_gc();
        Ok(id)
    }
}

#[async_trait]
impl ProgressSource for FfmpegProcess {
    async fn refresh(&mut self) -> Result<(), ExecError> {
        if let Some(handle) = self.handle.as_mut() {
            handle.refresh().await?;
        }
        self.record_finish();
        Ok(())
    }

    fn raw_buffer(&self) -> &str {
        self.handle
            .as_ref()
            .map(ExecutionHandle::raw_buffer)
            .unwrap_or_default()
    }

    fn buffer(&self) -> String {
        self.output()
    }

    fn is_started(&self) -> bool {
        self.handle.as_ref().is_some_and(ExecutionHandle::is_started)
    }

    fn is_completed(&self) -> bool {
        self.handle.as_ref().is_some_and(ExecutionHandle::is_completed)
    }

    fn has_error(&self) -> bool {
        self.handle.as_ref().is_some_and(ExecutionHandle::has_error)
    }

    fn error_code(&self) -> Option<i32> {
        self.handle.as_ref().and_then(ExecutionHandle::error_code)
    }

    fn run_time(&self) -> Duration {
        self.runtime()
    }

    fn input_files(&self) -> Vec<PathBuf> {
        match self.handle {
            Some(ref handle) => ProgressSource::input_files(handle),
            None => Vec::new(),
        }
    }

    fn output_files(&self) -> Vec<PathBuf> {
        match self.handle {
            Some(ref handle) => ProgressSource::output_files(handle),
            None => Vec::new(),
        }
    }

    fn progress_file(&self) -> Option<&Path> {
        self.handle.as_ref().and_then(ExecutionHandle::progress_file)
    }

    fn buffer_file(&self) -> Option<&Path> {
        self.handle.as_ref().and_then(ExecutionHandle::buffer_path)
    }
}

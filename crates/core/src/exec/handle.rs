//! Runtime state of one subprocess call.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ExecError;
use super::markers::BoundaryMarkers;
use super::portable::PortableState;
use crate::command::{Invocation, Platform};

/// Where the subprocess output goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BufferMode {
    /// Tool output is thrown away; only the markers are recorded.
    Discard,
    /// Output is captured in memory (blocking runs only).
    Inline,
    /// Output goes to a fresh temp file, removed with the handle.
    #[default]
    TempFile,
    /// Output goes to a caller-chosen file that is never removed.
    File(PathBuf),
}

/// Handle on one prepared or running subprocess.
///
/// Temp files created for the handle are removed when it is dropped or when
/// [`ExecutionHandle::delete_output`] is called, unless garbage collection
/// was disabled with [`ExecutionHandle::disable_gc`].
#[derive(Debug)]
pub struct ExecutionHandle {
    invocation: Invocation,
    platform: Platform,
    markers: BoundaryMarkers,
    mode: BufferMode,
    command: String,
    issued: Option<String>,
    buffer_path: Option<PathBuf>,
    progress_file: Option<PathBuf>,
    raw: String,
    blocking: bool,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    temp_files: Vec<PathBuf>,
    gc: bool,
}

impl ExecutionHandle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        invocation: Invocation,
        platform: Platform,
        markers: BoundaryMarkers,
        mode: BufferMode,
        command: String,
        buffer_path: Option<PathBuf>,
        temp_files: Vec<PathBuf>,
        gc: bool,
    ) -> Self {
        Self {
            invocation,
            platform,
            markers,
            mode,
            command,
            issued: None,
            buffer_path,
            progress_file: None,
            raw: String::new(),
            blocking: false,
            started_at: None,
            ended_at: None,
            temp_files,
            gc,
        }
    }

    /// Rebuilds a read-only handle from [`ExecutionHandle::portable_id`].
    ///
    /// The returned handle never removes the files it points at on drop;
    /// [`ExecutionHandle::delete_output`] still removes the job's temp files.
    pub fn from_portable_id(portable_id: &str) -> Result<Self, ExecError> {
        let state = PortableState::decode(portable_id)?;
        let invocation = Invocation::from_parts(
            state.program,
            state.args,
            state.inputs,
            state.outputs,
        );
        let buffer_path = state.buffer.clone();
        Ok(Self {
            invocation,
            platform: Platform::current(),
            markers: BoundaryMarkers::from_id(state.id),
            mode: BufferMode::File(state.buffer),
            command: String::new(),
            issued: None,
            buffer_path: Some(buffer_path),
            progress_file: state.progress_file,
            raw: String::new(),
            blocking: false,
            started_at: Some(state.started_at),
            ended_at: None,
            temp_files: state.temp_files,
            gc: false,
        })
    }

    /// Opaque id another process can use to resume polling this job.
    pub fn portable_id(&self) -> Result<String, ExecError> {
        let buffer = self
            .buffer_path
            .clone()
            .ok_or_else(|| ExecError::invalid_portable_id("inline buffers are not portable"))?;
        let started_at = self
            .started_at
            .ok_or_else(|| ExecError::invalid_portable_id("process has not been started"))?;
        PortableState {
            id: self.markers.id().to_string(),
            buffer,
            progress_file: self.progress_file.clone(),
            started_at,
            program: self.invocation.program().to_path_buf(),
            args: self.invocation.args().to_vec(),
            inputs: self.invocation.inputs().to_vec(),
            outputs: self.invocation.outputs().to_vec(),
            temp_files: self.temp_files.clone(),
        }
        .encode()
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn markers(&self) -> &BoundaryMarkers {
        &self.markers
    }

    pub fn mode(&self) -> &BufferMode {
        &self.mode
    }

    /// The marker-wrapped command, before redirection.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The exact script handed to the shell, once started.
    pub fn issued_command(&self) -> Option<&str> {
        self.issued.as_deref()
    }

    /// File the wrapped expression writes into, if any.
    pub fn buffer_path(&self) -> Option<&Path> {
        self.buffer_path.as_deref()
    }

    /// Sidecar file ffmpeg writes `-progress` output into, if any.
    pub fn progress_file(&self) -> Option<&Path> {
        self.progress_file.as_deref()
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Time since start, frozen once completion has been observed.
    pub fn runtime(&self) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - start).to_std().unwrap_or_default()
    }

    /// Re-reads the backing store into the raw buffer.
    ///
    /// A buffer file that does not exist yet reads as empty.
    pub async fn refresh(&mut self) -> Result<(), ExecError> {
        if let Some(ref path) = self.buffer_path {
            match tokio::fs::read(path).await {
                Ok(bytes) => self.raw = String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ExecError::Io(e)),
            }
        }

        if self.ended_at.is_none() && self.is_started() && self.markers.is_completed(&self.raw) {
            self.ended_at = Some(Utc::now());
            debug!(
                id = %self.markers.id(),
                error = self.has_error(),
                runtime_ms = self.runtime().as_millis() as u64,
                "Process completion observed"
            );
        }
        Ok(())
    }

    /// Refreshes and returns the buffer with the markers stripped.
    pub async fn read_buffer(&mut self) -> Result<String, ExecError> {
        self.refresh().await?;
        Ok(self.buffer())
    }

    /// Last read output, markers included.
    pub fn raw_buffer(&self) -> &str {
        &self.raw
    }

    /// Last read output with the markers stripped.
    pub fn buffer(&self) -> String {
        self.markers.strip(&self.raw)
    }

    pub fn is_completed(&self) -> bool {
        self.markers.is_completed(&self.raw)
    }

    pub fn has_error(&self) -> bool {
        self.markers.has_error(&self.raw)
    }

    pub fn error_code(&self) -> Option<i32> {
        self.markers.exit_code(&self.raw)
    }

    pub fn is_running(&self) -> bool {
        self.is_started() && !self.is_completed()
    }

    /// Keeps the temp files after the handle is dropped.
    pub fn disable_gc(&mut self) {
        self.gc = false;
    }

    pub fn gc_enabled(&self) -> bool {
        self.gc
    }

    /// Removes every temp file created for this handle now.
    pub fn delete_output(&mut self) -> Result<(), ExecError> {
        for path in self.temp_files.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ExecError::Io(e)),
            }
        }
        Ok(())
    }

    pub(crate) fn set_progress_file(&mut self, path: PathBuf, temporary: bool) {
        if temporary {
            self.temp_files.push(path.clone());
        }
        self.progress_file = Some(path);
    }

    pub(crate) fn mark_started(&mut self, at: DateTime<Utc>, blocking: bool, issued: String) {
        self.started_at = Some(at);
        self.blocking = blocking;
        self.issued = Some(issued);
    }

    pub(crate) fn set_inline(&mut self, raw: String) {
        self.raw = raw;
    }
}

impl Drop for ExecutionHandle {
    fn drop(&mut self) {
        if !self.gc {
            return;
        }
        if let Err(e) = self.delete_output() {
            warn!(error = %e, "Failed to remove temp files");
        }
    }
}

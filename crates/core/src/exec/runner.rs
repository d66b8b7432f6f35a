//! Launching marker-wrapped commands.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::error::ExecError;
use super::handle::{BufferMode, ExecutionHandle};
use super::markers::BoundaryMarkers;
use super::shell::{self, Sink};
use crate::command::{Invocation, Platform};
use crate::config::ExecConfig;
use crate::metrics;

/// Prepares and launches subprocesses through the host shell.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    temp_dir: PathBuf,
    temp_prefix: String,
    gc: bool,
    platform: Platform,
}

impl ProcessRunner {
    pub fn new(config: &ExecConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            temp_prefix: config.temp_prefix.clone(),
            gc: config.gc,
            platform: Platform::current(),
        }
    }

    /// Overrides the shell dialect (mostly for tests).
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Creates an empty, prefixed temp file that outlives this call.
    pub fn create_temp_file(&self, suffix: &str) -> Result<PathBuf, ExecError> {
        let file = tempfile::Builder::new()
            .prefix(&self.temp_prefix)
            .suffix(suffix)
            .tempfile_in(&self.temp_dir)
            .map_err(|source| ExecError::TempFile {
                dir: self.temp_dir.clone(),
                source,
            })?;
        let (_, path) = file.keep().map_err(|e| ExecError::TempFile {
            dir: self.temp_dir.clone(),
            source: e.error,
        })?;
        Ok(path)
    }

    /// Computes the wrapped command and markers for an invocation.
    ///
    /// Temp files are created here, so an unwritable temp dir fails before
    /// anything is spawned.
    pub fn prepare(
        &self,
        invocation: Invocation,
        mode: BufferMode,
    ) -> Result<ExecutionHandle, ExecError> {
        let mut temp_files = Vec::new();
        let buffer_path = match mode {
            BufferMode::TempFile | BufferMode::Discard => {
                let path = self.create_temp_file(".log")?;
                temp_files.push(path.clone());
                Some(path)
            }
            BufferMode::File(ref path) => Some(path.clone()),
            BufferMode::Inline => None,
        };

        let identity = format!(
            "{}:{}",
            buffer_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "inline".to_string()),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let markers = BoundaryMarkers::generate(&identity);
        let command = shell::wrap(
            self.platform,
            &invocation.to_shell_string(self.platform),
            &markers,
            mode == BufferMode::Discard,
        );

        debug!(
            id = %markers.id(),
            buffer = ?buffer_path,
            "Prepared process"
        );

        Ok(ExecutionHandle::new(
            invocation,
            self.platform,
            markers,
            mode,
            command,
            buffer_path,
            temp_files,
            self.gc,
        ))
    }

    /// Executes a prepared handle.
    ///
    /// Blocking runs wait for the wrapped expression and read the output
    /// once. Non-blocking runs background the expression and return as soon
    /// as the shell has forked it; the caller polls the handle afterwards.
    pub async fn run(&self, handle: &mut ExecutionHandle, blocking: bool) -> Result<(), ExecError> {
        if handle.is_started() {
            return Err(ExecError::AlreadyStarted);
        }
        if *handle.mode() == BufferMode::Inline && !blocking {
            return Err(ExecError::InlineRequiresBlocking);
        }

        let capture = handle.buffer_path().is_none();
        let sink = match handle.buffer_path() {
            Some(path) => Sink::File(path),
            None => Sink::Capture,
        };
        let script = shell::script(handle.platform(), handle.command(), sink, !blocking);
        let (shell, flags) = handle.platform().shell();

        info!(
            id = %handle.markers().id(),
            program = %handle.invocation().program().display(),
            blocking,
            "Launching process"
        );
        debug!(script = %script, "Issued shell command");

        let started_at = Utc::now();
        let mut command = Command::new(shell);
        command.args(flags);
        #[cfg(windows)]
        command.raw_arg(&script);
        #[cfg(not(windows))]
        command.arg(&script);
        command
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .stdout(if capture { Stdio::piped() } else { Stdio::null() });

        let output = command.output().await.map_err(|source| ExecError::Launch {
            shell: shell.to_string(),
            source,
        })?;

        handle.mark_started(started_at, blocking, script);
        metrics::PROCESSES_LAUNCHED
            .with_label_values(&[if blocking { "blocking" } else { "background" }])
            .inc();

        if !blocking {
            if !output.status.success() {
                warn!(
                    status = ?output.status.code(),
                    "Shell failed to background the process; no markers will be written"
                );
            }
            return Ok(());
        }

        if capture {
            handle.set_inline(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        handle.refresh().await?;
        if !handle.is_completed() {
            warn!(
                status = ?output.status.code(),
                "Shell returned without a completion marker"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner(dir: &TempDir) -> ProcessRunner {
        ProcessRunner::new(&ExecConfig {
            temp_dir: dir.path().to_path_buf(),
            temp_prefix: "ffwrap_test_".to_string(),
            gc: true,
        })
        .with_platform(Platform::Posix)
    }

    #[test]
    fn test_prepare_creates_prefixed_temp_buffer() {
        let dir = TempDir::new().unwrap();
        let handle = runner(&dir)
            .prepare(Invocation::from_args("true", Vec::<String>::new()), BufferMode::TempFile)
            .unwrap();

        let path = handle.buffer_path().unwrap().to_path_buf();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("ffwrap_test_"));
        assert!(handle.command().contains(&handle.markers().completion()));
        assert!(!handle.is_started());

        drop(handle);
        assert!(!path.exists());
    }

    #[test]
    fn test_prepare_fails_on_missing_temp_dir() {
        let runner = ProcessRunner::new(&ExecConfig {
            temp_dir: PathBuf::from("/nonexistent/ffwrap"),
            temp_prefix: "x".to_string(),
            gc: true,
        });
        let result = runner.prepare(Invocation::from_args("true", Vec::<String>::new()), BufferMode::TempFile);
        assert!(matches!(result, Err(ExecError::TempFile { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_blocking_success() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        let mut handle = runner
            .prepare(Invocation::from_args("echo", ["hello"]), BufferMode::TempFile)
            .unwrap();
        runner.run(&mut handle, true).await.unwrap();

        assert!(handle.is_completed());
        assert!(!handle.has_error());
        assert_eq!(handle.buffer(), "hello\n");
        assert!(handle.issued_command().is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_blocking_failure_reports_exit_code() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        let mut handle = runner
            .prepare(
                Invocation::from_args("sh", ["-c", "echo broken >&2; exit 3"]),
                BufferMode::TempFile,
            )
            .unwrap();
        runner.run(&mut handle, true).await.unwrap();

        assert!(handle.is_completed());
        assert!(handle.has_error());
        assert_eq!(handle.error_code(), Some(3));
        assert_eq!(handle.buffer(), "broken\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_inline_capture() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        let mut handle = runner
            .prepare(Invocation::from_args("echo", ["inline"]), BufferMode::Inline)
            .unwrap();
        runner.run(&mut handle, true).await.unwrap();

        assert!(handle.is_completed());
        assert_eq!(handle.buffer(), "inline\n");
        assert!(handle.buffer_path().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discard_keeps_only_markers() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        let mut handle = runner
            .prepare(Invocation::from_args("echo", ["noise"]), BufferMode::Discard)
            .unwrap();
        runner.run(&mut handle, true).await.unwrap();

        assert!(handle.is_completed());
        assert_eq!(handle.buffer(), "");
    }

    #[tokio::test]
    async fn test_inline_requires_blocking() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        let mut handle = runner
            .prepare(Invocation::from_args("echo", ["x"]), BufferMode::Inline)
            .unwrap();
        assert!(matches!(
            runner.run(&mut handle, false).await,
            Err(ExecError::InlineRequiresBlocking)
        ));
        assert!(!handle.is_started());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        let mut handle = runner
            .prepare(Invocation::from_args("true", Vec::<String>::new()), BufferMode::TempFile)
            .unwrap();
        runner.run(&mut handle, true).await.unwrap();
        assert!(matches!(
            runner.run(&mut handle, true).await,
            Err(ExecError::AlreadyStarted)
        ));
    }
}

//! Process lifecycle integration tests.
//!
//! These tests launch real `sh` subprocesses through the runner:
//! - Background launch and polling until the completion marker
//! - Blocking and non-blocking ffmpeg runs against a fake ffmpeg script
//! - Failure, signal and output validation reporting
//! - Resuming a job from its portable id

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use ffwrap_core::{
    config::ExecConfig,
    process::OutputProblem,
    testing::{
        write_fake_ffmpeg, FAKE_FFMPEG_EMPTY_OUTPUT, FAKE_FFMPEG_FAIL, FAKE_FFMPEG_INTERRUPTED,
        FAKE_FFMPEG_OK, FAKE_FFMPEG_SLOW,
    },
    BufferMode, Capabilities, CommandLine, Config, FfmpegProcess, Invocation, Platform,
    ProcessError, ProcessRunner, ProcessState, ProgressHandler, ProgressRecord, ProgressStatus,
    StderrProgress, Toolkit,
};

const POLL: Duration = Duration::from_millis(50);

/// Test helper owning the temp dir every file of a test lives in.
struct TestHarness {
    dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(&ExecConfig {
            temp_dir: self.dir.path().to_path_buf(),
            temp_prefix: "ffwrap_it_".to_string(),
            gc: true,
        })
        .with_platform(Platform::Posix)
    }

    fn fake_ffmpeg(&self, body: &str) -> PathBuf {
        write_fake_ffmpeg(self.dir.path(), body).unwrap()
    }

    fn process(&self, body: &str) -> FfmpegProcess {
        let ffmpeg = self.fake_ffmpeg(body);
        let mut process = FfmpegProcess::new(self.runner(), &ffmpeg)
            .with_polling(POLL, Some(Duration::from_secs(10)));
        process.add_input(self.path("in.mp4"));
        process
    }

    fn toolkit(&self, body: &str) -> Toolkit {
        let mut config = Config::default();
        config.ffmpeg.binary = self.fake_ffmpeg(body);
        config.exec.temp_dir = self.dir.path().to_path_buf();
        config.progress.poll_interval_ms = 50;
        Toolkit::new(config).unwrap()
    }
}

fn recording_callback() -> (
    Arc<Mutex<Vec<ProgressRecord>>>,
    Box<dyn FnMut(&ProgressRecord) + Send>,
) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);
    let callback: Box<dyn FnMut(&ProgressRecord) + Send> = Box::new(move |record: &ProgressRecord| {
        sink.lock().unwrap().push(record.clone());
    });
    (records, callback)
}

fn temp_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("ffwrap_")
        })
        .collect()
}

// =============================================================================
// Runner
// =============================================================================

#[tokio::test]
async fn test_background_command_pending_then_finished() {
    let harness = TestHarness::new();
    let runner = harness.runner();
    let mut handle = runner
        .prepare(
            Invocation::from_args("sh", ["-c", "sleep 0.5; echo hello"]),
            BufferMode::TempFile,
        )
        .unwrap();
    runner.run(&mut handle, false).await.unwrap();

    let mut handler = StderrProgress::new(None);
    let first = handler.probe(&mut handle, false, POLL).await.unwrap();
    assert_eq!(first.status, ProgressStatus::Pending);
    assert!(!first.finished);

    let mut last = first;
    for _ in 0..100 {
        last = handler.probe(&mut handle, true, POLL).await.unwrap();
        if last.finished {
            break;
        }
    }

    assert_eq!(last.status, ProgressStatus::Finished);
    assert!(last.finished);
    assert_eq!(last.percentage, 100.0);
    assert!(!last.error);
    assert_eq!(handle.buffer(), "hello\n");
    assert!(handle.runtime() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_background_output_before_completion_is_pending() {
    let harness = TestHarness::new();
    let runner = harness.runner();
    let mut handle = runner
        .prepare(
            Invocation::from_args("sh", ["-c", "echo hello; sleep 1"]),
            BufferMode::TempFile,
        )
        .unwrap();
    runner.run(&mut handle, false).await.unwrap();

    let mut handler = StderrProgress::new(None);
    let mut first = handler.probe(&mut handle, false, POLL).await.unwrap();
    for _ in 0..10 {
        if handle.buffer() == "hello\n" {
            break;
        }
        first = handler.probe(&mut handle, true, POLL).await.unwrap();
    }

    assert_eq!(handle.buffer(), "hello\n");
    assert_eq!(first.status, ProgressStatus::Pending);
    assert!(first.started);
    assert!(!first.finished);

    let mut last = first;
    for _ in 0..100 {
        last = handler.probe(&mut handle, true, POLL).await.unwrap();
        if last.finished {
            break;
        }
    }
    assert_eq!(last.status, ProgressStatus::Finished);
}

#[tokio::test]
async fn test_background_failure_exit_code() {
    let harness = TestHarness::new();
    let runner = harness.runner();
    let mut handle = runner
        .prepare(
            Invocation::from_args("sh", ["-c", "echo oops >&2; exit 7"]),
            BufferMode::TempFile,
        )
        .unwrap();
    runner.run(&mut handle, false).await.unwrap();

    for _ in 0..100 {
        handle.refresh().await.unwrap();
        if handle.is_completed() {
            break;
        }
        tokio::time::sleep(POLL).await;
    }

    assert!(handle.has_error());
    assert_eq!(handle.error_code(), Some(7));
    assert_eq!(handle.read_buffer().await.unwrap(), "oops\n");
}

// =============================================================================
// Blocking ffmpeg runs
// =============================================================================

#[tokio::test]
async fn test_blocking_run_validates_outputs() {
    let harness = TestHarness::new();
    let mut process = harness.process(FAKE_FFMPEG_OK);
    process.add_output(harness.path("out.mp4"), CommandLine::new());
    process.execute(true).await.unwrap();

    assert_eq!(process.state(), ProcessState::Completed);
    let reports = process.complete_process().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].size_bytes, 4);
    assert!(process.runtime() > Duration::ZERO);
}

#[tokio::test]
async fn test_two_outputs_present() {
    let harness = TestHarness::new();
    std::fs::write(harness.path("first.mp4"), b"first").unwrap();

    let mut process = harness.process(FAKE_FFMPEG_OK);
    process.add_output(harness.path("first.mp4"), CommandLine::new());
    let second = process.add_output(harness.path("second.mp4"), CommandLine::new());
    assert_eq!(second, 1);
    process.execute(true).await.unwrap();

    let reports = process.complete_process().await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].index, 0);
    assert_eq!(reports[1].path, harness.path("second.mp4"));
}

#[tokio::test]
async fn test_zero_size_output_names_path() {
    let harness = TestHarness::new();
    std::fs::write(harness.path("first.mp4"), b"").unwrap();

    let mut process = harness.process(FAKE_FFMPEG_OK);
    process.add_output(harness.path("first.mp4"), CommandLine::new());
    process.add_output(harness.path("second.mp4"), CommandLine::new());
    process.execute(true).await.unwrap();

    match process.complete_process().await {
        Err(ProcessError::OutputInvalid { path, .. }) => assert_eq!(path, harness.path("first.mp4")),
        other => panic!("expected OutputInvalid, got {:?}", other.map(|r| r.len())),
    }

    let report = process.output_report().await.unwrap();
    assert_eq!(
        report[0].problem,
        Some(OutputProblem::Empty {
            path: harness.path("first.mp4")
        })
    );
    assert!(report[1].is_valid());
}

#[tokio::test]
async fn test_empty_output_after_success_is_invalid() {
    let harness = TestHarness::new();
    let mut process = harness.process(FAKE_FFMPEG_EMPTY_OUTPUT);
    process.add_output(harness.path("out.mp4"), CommandLine::new());
    process.execute(true).await.unwrap();

    assert_eq!(process.state(), ProcessState::Completed);
    assert!(matches!(
        process.complete_process().await,
        Err(ProcessError::OutputInvalid { .. })
    ));
}

#[tokio::test]
async fn test_tool_failure_reported() {
    let harness = TestHarness::new();
    let (records, callback) = recording_callback();
    let mut process = harness.process(FAKE_FFMPEG_FAIL);
    process
        .attach(Box::new(StderrProgress::new(None)), Some(callback))
        .unwrap();
    process.add_output(harness.path("out.mp4"), CommandLine::new());
    process.execute(true).await.unwrap();

    assert_eq!(process.state(), ProcessState::Failed);
    let record = records.lock().unwrap().last().cloned().unwrap();
    assert_eq!(record.status, ProgressStatus::Error);
    assert!(record
        .error_message
        .unwrap()
        .contains("Error opening output file"));

    match process.complete_process().await {
        Err(ProcessError::ToolFailed { code, message }) => {
            assert_eq!(code, Some(1));
            assert!(message.contains("Unknown encoder 'libfoo'"));
        }
        other => panic!("expected ToolFailed, got {:?}", other.map(|r| r.len())),
    }
}

#[tokio::test]
async fn test_signal_is_interrupted() {
    let harness = TestHarness::new();
    let mut process = harness.process(FAKE_FFMPEG_INTERRUPTED);
    process.add_output(harness.path("out.mp4"), CommandLine::new());
    process.execute(true).await.unwrap();

    assert_eq!(process.state(), ProcessState::Interrupted);
    assert!(matches!(
        process.complete_process().await,
        Err(ProcessError::Interrupted { signal: 15, .. })
    ));
}

// =============================================================================
// Non-blocking ffmpeg runs
// =============================================================================

#[tokio::test]
async fn test_poll_loop_drives_callbacks() {
    let harness = TestHarness::new();
    let (records, callback) = recording_callback();
    let mut process = harness.process(FAKE_FFMPEG_SLOW);
    process
        .attach(Box::new(StderrProgress::new(None)), Some(callback))
        .unwrap();
    process.add_output(harness.path("out.mp4"), CommandLine::new());
    process.execute(false).await.unwrap();

    assert_eq!(process.state(), ProcessState::Completed);
    let records = records.lock().unwrap();
    assert!(records.len() >= 2);
    assert!(records.iter().all(|r| r.percentage <= 100.0));
    assert!(!records[0].finished);

    let last = records.last().unwrap();
    assert_eq!(last.status, ProgressStatus::Finished);
    assert_eq!(last.frame, 50);
    assert_eq!(last.output_count, 1);
}

#[tokio::test]
async fn test_native_progress_and_gc() {
    let harness = TestHarness::new();
    let mut toolkit = harness.toolkit(FAKE_FFMPEG_SLOW).with_capabilities(Capabilities {
        progress_flag: true,
        version: Some("6.1".to_string()),
    });
    let handler = toolkit
        .progress_handler(Some(Duration::from_secs(2)))
        .await
        .unwrap();
    assert_eq!(handler.name(), "native");
    let sidecar = handler.progress_file().unwrap().to_path_buf();

    let (records, callback) = recording_callback();
    let mut process = toolkit.process();
    process.add_input(harness.path("in.mp4"));
    process.attach(handler, Some(callback)).unwrap();
    process.add_output(harness.path("out.mp4"), CommandLine::new());
    process.execute(false).await.unwrap();

    {
        let records = records.lock().unwrap();
        let last = records.last().unwrap();
        assert_eq!(last.status, ProgressStatus::Finished);
        assert_eq!(last.frame, 50);
        assert_eq!(last.size_bytes, Some(2048));
    }
    assert!(std::fs::read_to_string(&sidecar)
        .unwrap()
        .contains("progress=end"));

    process.complete_process().await.unwrap();
    drop(process);
    assert!(!sidecar.exists());
    assert!(temp_files(harness.dir.path()).is_empty());
}

#[tokio::test]
async fn test_failed_launch_removes_native_sidecar() {
    let harness = TestHarness::new();
    let mut toolkit = harness.toolkit(FAKE_FFMPEG_OK).with_capabilities(Capabilities {
        progress_flag: true,
        version: None,
    });
    let handler = toolkit.progress_handler(None).await.unwrap();
    let sidecar = handler.progress_file().unwrap().to_path_buf();
    assert!(sidecar.exists());

    let mut process = toolkit.process();
    process.add_input(harness.path("in.mp4"));
    process.attach(handler, None).unwrap();
    assert!(matches!(
        process.execute(false).await,
        Err(ProcessError::Command(_))
    ));

    drop(process);
    assert!(!sidecar.exists());
    assert!(temp_files(harness.dir.path()).is_empty());
}

#[tokio::test]
async fn test_wait_until_complete_without_handlers() {
    let harness = TestHarness::new();
    let mut process = harness.process(FAKE_FFMPEG_SLOW);
    process.add_output(harness.path("out.mp4"), CommandLine::new());
    process.execute(false).await.unwrap();
    assert_eq!(process.state(), ProcessState::Running);

    process.wait_until_complete().await.unwrap();
    assert_eq!(process.state(), ProcessState::Completed);
    assert!(process.last_line().unwrap().contains("Lsize="));
}

#[tokio::test]
async fn test_poll_timeout() {
    let harness = TestHarness::new();
    let mut process = harness
        .process("sleep 3\n")
        .with_polling(POLL, Some(Duration::from_millis(300)));
    process
        .attach(Box::new(StderrProgress::new(None)), None)
        .unwrap();
    process.add_output(harness.path("out.mp4"), CommandLine::new());

    assert!(matches!(
        process.execute(false).await,
        Err(ProcessError::PollTimeout(_))
    ));
    assert_eq!(process.state(), ProcessState::Running);
}

#[tokio::test]
async fn test_resume_from_portable_id() {
    let harness = TestHarness::new();
    let toolkit = harness.toolkit(FAKE_FFMPEG_SLOW);
    let mut process = toolkit.process();
    process.add_input(harness.path("in.mp4"));
    process.add_output(harness.path("out.mp4"), CommandLine::new());
    process.execute(false).await.unwrap();

    let id = process.portable_id().unwrap();
    drop(process);

    let (mut resumed, mut handler) = toolkit.resume(&id).unwrap();
    assert_eq!(handler.name(), "stderr");

    let mut record = handler.probe(&mut resumed, false, POLL).await.unwrap();
    for _ in 0..100 {
        if record.finished {
            break;
        }
        record = handler.probe(&mut resumed, true, POLL).await.unwrap();
    }
    assert_eq!(record.status, ProgressStatus::Finished);
    assert_eq!(record.output_files, vec![harness.path("out.mp4")]);

    let reports = resumed.complete_process().await.unwrap();
    assert_eq!(reports.len(), 1);
    drop(handler);
    assert!(!temp_files(harness.dir.path()).is_empty());
    resumed.delete_output().unwrap();
    assert!(temp_files(harness.dir.path()).is_empty());
}

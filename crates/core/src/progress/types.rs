//! Progress record types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Coarse status of a running encode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Not started, or started without any output yet.
    #[default]
    Pending,
    /// ffmpeg has printed its header but no progress report yet.
    Decoding,
    Encoding,
    /// Within the last half percent; waiting for the terminal marker.
    Finalising,
    /// ffmpeg printed its final report; the process has not exited yet.
    Completed,
    /// The process exited successfully.
    Finished,
    /// The process was stopped by a known signal.
    Interrupted,
    Error,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::Decoding => "decoding",
            ProgressStatus::Encoding => "encoding",
            ProgressStatus::Finalising => "finalising",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Finished => "finished",
            ProgressStatus::Interrupted => "interrupted",
            ProgressStatus::Error => "error",
        }
    }

    /// Whether no further updates can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStatus::Finished | ProgressStatus::Interrupted | ProgressStatus::Error
        )
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an encode, produced fresh on every probe.
///
/// Once `finished` is set the record is frozen: later probes return the same
/// values, and `percentage` is 100 unless `interrupted` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub error: bool,
    pub error_message: Option<String>,
    pub started: bool,
    pub finished: bool,
    pub completed: bool,
    pub interrupted: bool,
    pub status: ProgressStatus,
    /// Seconds since the process was launched.
    pub run_time: f64,
    /// 0 to 100.
    pub percentage: f64,
    pub fps_avg: f64,
    pub fps: f64,
    pub frame: u64,
    pub size_bytes: Option<u64>,
    /// Seconds of media encoded so far.
    pub duration: f64,
    /// Seconds of media expected in total, when known.
    pub expected_duration: Option<f64>,
    pub dropped_frames: u64,
    pub duplicated_frames: u64,
    pub input_files: Vec<PathBuf>,
    pub output_files: Vec<PathBuf>,
    pub output_count: usize,
    /// Buffer file the record was read from.
    pub process_file: Option<PathBuf>,
}

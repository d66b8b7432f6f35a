//! Progress from ffmpeg's `-progress <file>` sidecar.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::tracker::{parse_timecode, ProgressSample, ProgressTracker};
use super::traits::{ProgressHandler, ProgressSource};
use super::types::ProgressRecord;
use crate::command::CommandLine;
use crate::exec::ExecError;
use crate::metrics;

/// Reads the `key=value` blocks ffmpeg writes with `-progress`.
///
/// Each block ends with `progress=continue`, or `progress=end` for the last
/// one. Only the last complete block is used.
///
/// A handler built with [`NativeProgress::temporary`] owns its sidecar and
/// removes it on drop, until the file is released to a process.
#[derive(Debug)]
pub struct NativeProgress {
    tracker: ProgressTracker,
    progress_file: PathBuf,
    owned: bool,
}

impl NativeProgress {
    pub fn new(progress_file: impl Into<PathBuf>, expected_duration: Option<Duration>) -> Self {
        Self {
            tracker: ProgressTracker::new(expected_duration),
            progress_file: progress_file.into(),
            owned: false,
        }
    }

    /// A handler owning a freshly created sidecar file.
    pub fn temporary(progress_file: impl Into<PathBuf>, expected_duration: Option<Duration>) -> Self {
        Self {
            tracker: ProgressTracker::new(expected_duration),
            progress_file: progress_file.into(),
            owned: true,
        }
    }

    async fn read(path: &Path) -> Result<String, ExecError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ExecError::Io(e)),
        }
    }
}

impl Drop for NativeProgress {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        match std::fs::remove_file(&self.progress_file) {
            Ok(()) => debug!(path = %self.progress_file.display(), "Removed unused progress file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "Failed to remove progress file"),
        }
    }
}

/// Splits sidecar content into complete blocks.
fn parse_blocks(content: &str) -> Vec<HashMap<&str, &str>> {
    let mut blocks = Vec::new();
    let mut current = HashMap::new();
    for line in content.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        current.insert(key, value);
        if key == "progress" {
            blocks.push(std::mem::take(&mut current));
        }
    }
    blocks
}

fn sample_from_block(block: &HashMap<&str, &str>) -> ProgressSample {
    let number = |key: &str| block.get(key).and_then(|v| v.parse::<u64>().ok());
    // out_time_ms carries microseconds as well.
    let time = block
        .get("out_time_us")
        .or_else(|| block.get("out_time_ms"))
        .and_then(|v| v.parse::<i64>().ok())
        .map(|us| us as f64 / 1_000_000.0)
        .or_else(|| block.get("out_time").and_then(|v| parse_timecode(v)));

    ProgressSample {
        frame: number("frame").unwrap_or_default(),
        fps: block
            .get("fps")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default(),
        size_bytes: number("total_size"),
        time,
        duplicated_frames: number("dup_frames").unwrap_or_default(),
        dropped_frames: number("drop_frames").unwrap_or_default(),
        last_report: block.get("progress") == Some(&"end"),
    }
}

#[async_trait]
impl ProgressHandler for NativeProgress {
    fn name(&self) -> &'static str {
        "native"
    }

    fn commands(&self) -> CommandLine {
        let mut commands = CommandLine::new();
        commands.push("-progress", Some(&self.progress_file.to_string_lossy()));
        commands
    }

    fn progress_file(&self) -> Option<&Path> {
        Some(&self.progress_file)
    }

    fn release_progress_file(&mut self) -> bool {
        std::mem::replace(&mut self.owned, false)
    }

    async fn probe(
        &mut self,
        source: &mut dyn ProgressSource,
        wait_before_next: bool,
        interval: Duration,
    ) -> Result<ProgressRecord, ExecError> {
        if wait_before_next && !self.tracker.is_frozen() {
            tokio::time::sleep(interval).await;
        }
        source.refresh().await?;
        metrics::PROGRESS_PROBES.with_label_values(&[self.name()]).inc();

        let path = source
            .progress_file()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.progress_file.clone());
        let content = Self::read(&path).await?;
        let sample = parse_blocks(&content).last().map(sample_from_block);
        Ok(self.tracker.update(&*source, sample))
    }
}

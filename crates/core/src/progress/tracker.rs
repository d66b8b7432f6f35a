//! State shared by every progress strategy.
//!
//! A strategy parses the latest report out of the job's output into a
//! [`ProgressSample`]; the tracker turns samples into records, applies the
//! percentage rules and freezes the record once the job has finished.

use regex_lite::Regex;
use std::time::Duration;
use tracing::debug;

use super::traits::ProgressSource;
use super::types::{ProgressRecord, ProgressStatus};
use crate::process::signal;

/// Percentage from which a job is considered finalising.
const FINALISING_THRESHOLD: f64 = 99.5;

/// One progress report as parsed from ffmpeg's output.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ProgressSample {
    pub frame: u64,
    pub fps: f64,
    pub size_bytes: Option<u64>,
    /// Seconds of media encoded.
    pub time: Option<f64>,
    pub dropped_frames: u64,
    pub duplicated_frames: u64,
    /// ffmpeg flagged this as its final report.
    pub last_report: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    expected_duration: Option<f64>,
    fps_samples: Vec<f64>,
    frozen: Option<ProgressRecord>,
}

impl ProgressTracker {
    pub fn new(expected_duration: Option<Duration>) -> Self {
        Self {
            expected_duration: expected_duration
                .map(|d| d.as_secs_f64())
                .filter(|secs| *secs > 0.0),
            ..Default::default()
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Builds the record for the source's current state.
    pub fn update(
        &mut self,
        source: &dyn ProgressSource,
        sample: Option<ProgressSample>,
    ) -> ProgressRecord {
        if let Some(ref frozen) = self.frozen {
            return frozen.clone();
        }

        let buffer = source.buffer();
        if self.expected_duration.is_none() {
            self.expected_duration = parse_input_duration(&buffer);
        }

        let output_files = source.output_files();
        let mut record = ProgressRecord {
            started: source.is_started(),
            run_time: source.run_time().as_secs_f64(),
            expected_duration: self.expected_duration,
            input_files: source.input_files(),
            output_count: output_files.len(),
            output_files,
            process_file: source.buffer_file().map(|p| p.to_path_buf()),
            ..Default::default()
        };

        if !record.started {
            record.status = ProgressStatus::Pending;
        } else if let Some(sample) = sample {
            self.apply_sample(&mut record, &sample);
        } else if has_ffmpeg_header(&buffer) {
            record.status = ProgressStatus::Decoding;
        } else {
            record.status = ProgressStatus::Pending;
        }

        if source.is_completed() {
            self.finish(&mut record, source, &buffer);
        }
        record
    }

    fn apply_sample(&mut self, record: &mut ProgressRecord, sample: &ProgressSample) {
        record.status = ProgressStatus::Encoding;
        record.frame = sample.frame;
        record.fps = sample.fps;
        record.size_bytes = sample.size_bytes;
        record.dropped_frames = sample.dropped_frames;
        record.duplicated_frames = sample.duplicated_frames;
        record.duration = sample.time.unwrap_or_default().max(0.0);

        self.fps_samples.push(sample.fps);
        record.fps_avg = self.average_fps(sample.frame, record.run_time);

        if let Some(expected) = self.expected_duration {
            let percentage = percentage_of(record.duration, expected);
            record.percentage = percentage;
            if percentage >= 100.0 {
                record.status = ProgressStatus::Finalising;
            }
        }

        if sample.last_report {
            record.status = ProgressStatus::Completed;
            record.percentage = 100.0;
        }
    }

    /// Mean of the sampled fps values, or frame / run time for a single sample.
    fn average_fps(&self, frame: u64, run_time: f64) -> f64 {
        if self.fps_samples.len() > 1 {
            self.fps_samples.iter().sum::<f64>() / self.fps_samples.len() as f64
        } else if run_time > 0.0 {
            frame as f64 / run_time
        } else {
            0.0
        }
    }

    fn finish(&mut self, record: &mut ProgressRecord, source: &dyn ProgressSource, buffer: &str) {
        record.finished = true;

        if !source.has_error() {
            record.completed = true;
            record.status = ProgressStatus::Finished;
        } else if let Some(termination) = signal::classify(buffer) {
            record.error = true;
            record.error_message = Some(termination.message());
            match termination {
                signal::Termination::Known { .. } => {
                    record.interrupted = true;
                    record.status = ProgressStatus::Interrupted;
                }
                signal::Termination::Unknown { .. } => {
                    record.status = ProgressStatus::Error;
                }
            }
        } else {
            record.error = true;
            record.error_message = error_message(buffer)
                .or_else(|| source.error_code().map(|code| format!("Exited with code {}", code)));
            record.status = ProgressStatus::Error;
        }

        if !record.interrupted {
            record.percentage = 100.0;
        }

        debug!(
            status = %record.status,
            run_time = record.run_time,
            "Progress record frozen"
        );
        self.frozen = Some(record.clone());
    }
}

/// `time / expected * 100`, forced to 100 from the finalising threshold.
pub(crate) fn percentage_of(time: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return 0.0;
    }
    let percentage = time / expected * 100.0;
    if percentage >= FINALISING_THRESHOLD {
        100.0
    } else {
        percentage.max(0.0)
    }
}

/// Whether ffmpeg has started describing its inputs or stream mapping.
fn has_ffmpeg_header(buffer: &str) -> bool {
    buffer.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("Input #")
            || line.starts_with("Output #")
            || line.starts_with("Stream mapping:")
            || line.starts_with("Press [q]")
    })
}

/// Parses `HH:MM:SS.ss` (or plain seconds) into seconds.
pub(crate) fn parse_timecode(value: &str) -> Option<f64> {
    let value = value.trim();
    let negative = value.starts_with('-');
    let value = value.trim_start_matches('-');

    let mut seconds = 0.0;
    for part in value.split(':') {
        let part: f64 = part.parse().ok()?;
        seconds = seconds * 60.0 + part;
    }
    Some(if negative { -seconds } else { seconds })
}

/// Duration of the first input, from ffmpeg's `Duration: HH:MM:SS.ss` line.
pub(crate) fn parse_input_duration(buffer: &str) -> Option<f64> {
    let re = Regex::new(r"Duration:\s*(\d+:\d+:\d+(?:\.\d+)?)").ok()?;
    let caps = re.captures(buffer)?;
    parse_timecode(caps.get(1)?.as_str()).filter(|secs| *secs > 0.0)
}

/// Trailing run of non-indented lines, joined.
///
/// ffmpeg indents continuation lines of multi-line reports, so the run stops
/// at the first indented (or blank) line walking backwards.
pub(crate) fn error_message(buffer: &str) -> Option<String> {
    let lines: Vec<&str> = buffer.split(['\r', '\n']).map(str::trim_end).collect();
    let mut tail: Vec<&str> = lines
        .iter()
        .rev()
        .skip_while(|line| line.is_empty())
        .take_while(|line| !line.is_empty() && !line.starts_with([' ', '\t']))
        .copied()
        .collect();
    if tail.is_empty() {
        return None;
    }
    tail.reverse();
    Some(tail.join("\n"))
}

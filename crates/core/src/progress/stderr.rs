//! Progress from ffmpeg's stderr status lines.

use async_trait::async_trait;
use regex_lite::Regex;
use std::time::Duration;

use super::tracker::{parse_timecode, ProgressSample, ProgressTracker};
use super::traits::{ProgressHandler, ProgressSource};
use super::types::ProgressRecord;
use crate::exec::ExecError;
use crate::metrics;

/// Parses the repeating `frame= fps= q= size= time= bitrate=` report.
///
/// ffmpeg prints one `q=` per output video stream, so the pattern is built
/// from the number of video streams in the `Output #` section once it shows
/// up in the buffer.
#[derive(Debug)]
pub struct StderrProgress {
    tracker: ProgressTracker,
    video_streams: Option<usize>,
}

impl StderrProgress {
    pub fn new(expected_duration: Option<Duration>) -> Self {
        Self {
            tracker: ProgressTracker::new(expected_duration),
            video_streams: None,
        }
    }

    fn parse(&mut self, buffer: &str) -> Option<ProgressSample> {
        if self.video_streams.is_none() {
            self.video_streams = count_output_video_streams(buffer);
        }
        let re = report_pattern(self.video_streams)?;
        let caps = re.captures_iter(buffer).last()?;

        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
        let last_report =
            caps.get(3).is_some_and(|m| m.as_str().contains("Lq=")) || caps.get(4).is_some_and(|m| m.as_str() == "L");

        Some(ProgressSample {
            frame: number(1).unwrap_or_default(),
            fps: caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or_default(),
            size_bytes: number(5).map(|size| size * unit_multiplier(caps.get(6).map(|m| m.as_str()))),
            time: caps.get(7).and_then(|m| parse_timecode(m.as_str())),
            duplicated_frames: number(9).unwrap_or_default(),
            dropped_frames: number(10).unwrap_or_default(),
            last_report,
        })
    }
}

/// Builds the report pattern for `streams` output video streams.
fn report_pattern(streams: Option<usize>) -> Option<Regex> {
    let quality = match streams {
        Some(n) if n > 0 => format!("{{{}}}", n),
        Some(_) => "{0}".to_string(),
        None => "*".to_string(),
    };
    Regex::new(&format!(
        r"frame=\s*(\d+)\s+fps=\s*([\d.]+)\s+((?:L?q=\s*-?[\d.]+\s+){})(L?)size=\s*(N/A|\d+)\s*([kKM]i?B|B)?\s+time=\s*(N/A|-?[\d:.]+)\s+bitrate=\s*(N/A|[\d.]+)\s*(?:[kKmM]?bits/s)?(?:\s+dup=\s*(\d+)\s+drop=\s*(\d+))?",
        quality
    ))
    .ok()
}

/// Counts `Stream #x:y ... Video:` lines after the first `Output #` header.
fn count_output_video_streams(buffer: &str) -> Option<usize> {
    let start = buffer.find("Output #")?;
    let section = &buffer[start..];
    // The section ends at the mapping table or the first report.
    let end = ["Stream mapping:", "frame="]
        .iter()
        .filter_map(|marker| section.find(marker))
        .min()?;
    let re = Regex::new(r"Stream #\d+:\d+.*?: Video:").ok()?;
    Some(
        section[..end]
            .lines()
            .filter(|line| re.is_match(line))
            .count(),
    )
}

fn unit_multiplier(unit: Option<&str>) -> u64 {
    match unit {
        Some("kB") | Some("KB") | Some("kiB") | Some("KiB") => 1024,
        Some("MB") | Some("MiB") => 1024 * 1024,
        _ => 1,
    }
}

#[async_trait]
impl ProgressHandler for StderrProgress {
    fn name(&self) -> &'static str {
        "stderr"
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

        let sample = self.parse(&source.buffer());
        Ok(self.tracker.update(&*source, sample))
    }
}

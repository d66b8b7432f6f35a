//! ffmpeg feature detection.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::ExecError;
use crate::metrics;

/// Features of the installed ffmpeg binary that change how it is driven.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// `-progress <url>` is supported
    pub progress_flag: bool,
    /// Version string from the banner, e.g. `6.1.1`
    pub version: Option<String>,
}

impl Capabilities {
    /// Detect capabilities by running `ffmpeg -h long`.
    pub async fn detect(ffmpeg: &Path) -> Result<Self, ExecError> {
        metrics::CAPABILITY_PROBES.inc();
        let output = Command::new(ffmpeg)
            .args(["-hide_banner", "-h", "long"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExecError::BinaryNotFound {
                        path: ffmpeg.to_path_buf(),
                    }
                } else {
                    ExecError::Io(e)
                }
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let mut capabilities = Self::from_help_output(&text);

        if capabilities.version.is_none() {
            if let Ok(version) = Command::new(ffmpeg)
                .arg("-version")
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await
            {
                capabilities.version = parse_version(&String::from_utf8_lossy(&version.stdout));
            }
        }

        info!(
            ffmpeg = %ffmpeg.display(),
            progress_flag = capabilities.progress_flag,
            version = capabilities.version.as_deref().unwrap_or("unknown"),
            "Detected ffmpeg capabilities"
        );
        Ok(capabilities)
    }

    /// Reads capabilities out of ffmpeg's help text.
    pub fn from_help_output(text: &str) -> Self {
        let progress_flag = text
            .lines()
            .any(|line| line.trim_start().starts_with("-progress "));
        Self {
            progress_flag,
            version: parse_version(text),
        }
    }
}

fn parse_version(text: &str) -> Option<String> {
    let re = Regex::new(r"ffmpeg version (\S+)").ok()?;
    Some(re.captures(text)?.get(1)?.as_str().to_string())
}

/// Holds the result of [`Capabilities::detect`] for one binary.
///
/// Detection runs the binary, so it happens once and is reused until
/// [`CapabilityCache::invalidate`] is called or `get(true)` is used.
#[derive(Debug, Clone)]
pub struct CapabilityCache {
    ffmpeg: PathBuf,
    cached: Option<Capabilities>,
}

impl CapabilityCache {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            cached: None,
        }
    }

    /// A cache primed with known capabilities.
    pub fn with_capabilities(ffmpeg: impl Into<PathBuf>, capabilities: Capabilities) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            cached: Some(capabilities),
        }
    }

    /// Returns the cached capabilities, detecting them first if needed.
    pub async fn get(&mut self, invalidate: bool) -> Result<Capabilities, ExecError> {
        if invalidate {
            self.invalidate();
        }
        if let Some(ref cached) = self.cached {
            return Ok(cached.clone());
        }
        let detected = Capabilities::detect(&self.ffmpeg).await?;
        self.cached = Some(detected.clone());
        Ok(detected)
    }

    pub fn read_from_cache(&self) -> Option<&Capabilities> {
        self.cached.as_ref()
    }

    pub fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            debug!(ffmpeg = %self.ffmpeg.display(), "Capability cache invalidated");
        }
    }
}

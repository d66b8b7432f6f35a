use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Location of the ffmpeg binary
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
        }
    }
}

fn default_binary() -> PathBuf {
    PathBuf::from("ffmpeg")
}

/// Process runner configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecConfig {
    /// Directory for output buffers and progress sidecar files.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Prefix for every temp file the runner creates.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
    /// Remove temp files when a handle is dropped.
    #[serde(default = "default_gc")]
    pub gc: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            temp_prefix: default_temp_prefix(),
            gc: default_gc(),
        }
    }
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_temp_prefix() -> String {
    "ffwrap_".to_string()
}

fn default_gc() -> bool {
    true
}

/// Progress parsing strategy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStrategy {
    /// Native when the installed ffmpeg supports `-progress`, stderr otherwise.
    #[default]
    Auto,
    /// Parse the `-progress` key=value sidecar file.
    Native,
    /// Parse the `frame= ... time= ...` status lines on stderr.
    Stderr,
}

impl ProgressStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Native => "native",
            Self::Stderr => "stderr",
        }
    }
}

/// Progress polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    #[serde(default)]
    pub strategy: ProgressStrategy,
    /// Sleep between two probes of a running process.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up polling after this many seconds (unbounded when unset).
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            strategy: ProgressStrategy::default(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: None,
        }
    }
}

impl ProgressConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[ffmpeg]
binary = "/usr/local/bin/ffmpeg"

[exec]
temp_dir = "/var/tmp"
temp_prefix = "encode_"
gc = false

[progress]
strategy = "native"
poll_interval_ms = 500
poll_timeout_secs = 3600
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ffmpeg.binary, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.exec.temp_dir, PathBuf::from("/var/tmp"));
        assert_eq!(config.exec.temp_prefix, "encode_");
        assert!(!config.exec.gc);
        assert_eq!(config.progress.strategy, ProgressStrategy::Native);
        assert_eq!(config.progress.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.progress.poll_timeout(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.ffmpeg.binary, PathBuf::from("ffmpeg"));
        assert_eq!(config.exec.temp_dir, std::env::temp_dir());
        assert_eq!(config.progress.poll_interval_ms, 1000);
        assert!(config.progress.poll_timeout().is_none());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(ProgressStrategy::Auto.as_str(), "auto");
        assert_eq!(ProgressStrategy::Native.as_str(), "native");
        assert_eq!(ProgressStrategy::Stderr.as_str(), "stderr");
    }
}

//! Command-line arguments.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use ffwrap_core::ProgressStrategy;

#[derive(Parser, Debug)]
#[command(name = "ffwrap")]
#[command(about = "Run ffmpeg as a tracked subprocess and report its progress")]
#[command(version)]
pub struct Args {
    /// Input file (repeatable)
    #[arg(short, long = "input", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file
    pub output: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, env = "FFWRAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output option as `name=value`, e.g. `video_codec=libx264` (repeatable)
    #[arg(short = 's', long = "set", value_parser = parse_key_val)]
    pub options: Vec<(String, String)>,

    /// Raw output flag as `-flag` or `-flag=value`, e.g. `-y` (repeatable)
    #[arg(long = "raw", allow_hyphen_values = true)]
    pub raw: Vec<String>,

    /// Wait for ffmpeg to exit instead of polling its progress
    #[arg(long)]
    pub blocking: bool,

    /// Progress strategy, overriding the configuration
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Expected media duration in seconds (read from ffmpeg's output otherwise)
    #[arg(long)]
    pub expected_duration: Option<f64>,

    /// Print Prometheus metrics when done
    #[arg(long)]
    pub metrics: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    Auto,
    Native,
    Stderr,
}

impl From<StrategyArg> for ProgressStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => ProgressStrategy::Auto,
            StrategyArg::Native => ProgressStrategy::Native,
            StrategyArg::Stderr => ProgressStrategy::Stderr,
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{}`", s))?;
    if key.is_empty() {
        return Err(format!("missing option name in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Splits `-flag=value` into flag and optional value.
pub fn split_raw(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (raw, None),
    }
}

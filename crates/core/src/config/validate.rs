use super::{types::Config, ConfigError};
use crate::progress::HandlerRegistry;

/// Validate configuration
/// Currently validates:
/// - ffmpeg binary path is not empty
/// - temp dir exists and is a directory
/// - temp prefix holds no path separators
/// - poll interval is not 0
/// - the progress strategy has a registered handler
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.ffmpeg.binary.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "ffmpeg.binary cannot be empty".to_string(),
        ));
    }

    if !config.exec.temp_dir.is_dir() {
        return Err(ConfigError::ValidationError(format!(
            "exec.temp_dir is not a directory: {}",
            config.exec.temp_dir.display()
        )));
    }

    if config.exec.temp_prefix.contains(['/', '\\']) {
        return Err(ConfigError::ValidationError(
            "exec.temp_prefix cannot contain path separators".to_string(),
        ));
    }

    if config.progress.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "progress.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    HandlerRegistry::default().validate(config.progress.strategy)?;

    Ok(())
}

//! Entry point tying configuration, runner, capabilities and progress
//! handlers together.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use crate::capabilities::{Capabilities, CapabilityCache};
use crate::config::{validate_config, Config, ConfigError, ProgressStrategy};
use crate::exec::{ExecError, ExecutionHandle, ProcessRunner};
use crate::process::FfmpegProcess;
use crate::progress::{
    HandlerContext, HandlerRegistry, NativeProgress, ProgressHandler, StderrProgress,
};

/// Builds processes and progress handlers from one validated [`Config`].
#[derive(Clone)]
pub struct Toolkit {
    config: Config,
    runner: ProcessRunner,
    capabilities: CapabilityCache,
    registry: HandlerRegistry,
}

impl Toolkit {
    /// Validates `config` and builds a toolkit with the default handlers.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::with_registry(config, HandlerRegistry::default())
    }

    /// Like [`Toolkit::new`] with a custom handler registry.
    pub fn with_registry(config: Config, registry: HandlerRegistry) -> Result<Self, ConfigError> {
        validate_config(&config)?;
        registry.validate(config.progress.strategy)?;
        Ok(Self {
            runner: ProcessRunner::new(&config.exec),
            capabilities: CapabilityCache::new(&config.ffmpeg.binary),
            registry,
            config,
        })
    }

    /// Skips capability detection by priming the cache.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = CapabilityCache::with_capabilities(&self.config.ffmpeg.binary, capabilities);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Checks that the configured ffmpeg binary runs.
    pub async fn validate(&self) -> Result<(), ExecError> {
        let binary = &self.config.ffmpeg.binary;
        let output = Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => Ok(()),
            Ok(_) => Err(ExecError::BinaryNotFound {
                path: binary.clone(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExecError::BinaryNotFound {
                path: binary.clone(),
            }),
            Err(e) => Err(ExecError::Io(e)),
        }
    }

    /// Capabilities of the configured binary, detected once.
    pub async fn capabilities(&mut self, invalidate: bool) -> Result<Capabilities, ExecError> {
        self.capabilities.get(invalidate).await
    }

    /// A new process for the configured binary, polling as configured.
    pub fn process(&self) -> FfmpegProcess {
        FfmpegProcess::new(self.runner.clone(), &self.config.ffmpeg.binary).with_polling(
            self.config.progress.poll_interval(),
            self.config.progress.poll_timeout(),
        )
    }

    /// A handler for the configured strategy.
    ///
    /// Only `auto` needs to know whether `-progress` is supported, so only
    /// `auto` runs capability detection.
    pub async fn progress_handler(
        &mut self,
        expected_duration: Option<Duration>,
    ) -> Result<Box<dyn ProgressHandler>, ExecError> {
        let strategy = self.config.progress.strategy;
        let capabilities = match strategy {
            ProgressStrategy::Auto => self.capabilities.get(false).await?,
            _ => Capabilities::default(),
        };
        let ctx = HandlerContext {
            runner: &self.runner,
            capabilities: &capabilities,
            expected_duration,
        };
        self.registry.create(strategy, &ctx)
    }

    /// Rebuilds a process from a portable id, with a handler matching how
    /// it was launched.
    pub fn resume(
        &self,
        portable_id: &str,
    ) -> Result<(FfmpegProcess, Box<dyn ProgressHandler>), ExecError> {
        let handle = ExecutionHandle::from_portable_id(portable_id)?;
        let handler: Box<dyn ProgressHandler> = match handle.progress_file() {
            Some(path) => Box::new(NativeProgress::new(path, None)),
            None => Box::new(StderrProgress::new(None)),
        };
        info!(
            id = %handle.markers().id(),
            handler = handler.name(),
            "Resumed process from portable id"
        );
        let process = FfmpegProcess::from_handle(self.runner.clone(), handle).with_polling(
            self.config.progress.poll_interval(),
            self.config.progress.poll_timeout(),
        );
        Ok((process, handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.ffmpeg.binary = PathBuf::from("/nonexistent/ffmpeg");
        config.exec.temp_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.progress.poll_interval_ms = 0;
        assert!(Toolkit::new(config).is_err());
    }

    #[test]
    fn test_custom_registry_is_validated() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.progress.strategy = ProgressStrategy::Native;
        assert!(Toolkit::with_registry(config, HandlerRegistry::empty()).is_err());
    }

    #[tokio::test]
    async fn test_validate_missing_binary() {
        let dir = TempDir::new().unwrap();
        let toolkit = Toolkit::new(config(&dir)).unwrap();
        assert!(matches!(
            toolkit.validate().await,
            Err(ExecError::BinaryNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stderr_strategy_skips_detection() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.progress.strategy = ProgressStrategy::Stderr;
        let mut toolkit = Toolkit::new(config).unwrap();

        let handler = toolkit.progress_handler(None).await.unwrap();
        assert_eq!(handler.name(), "stderr");
    }

    #[tokio::test]
    async fn test_auto_uses_primed_capabilities() {
        let dir = TempDir::new().unwrap();
        let mut toolkit = Toolkit::new(config(&dir)).unwrap().with_capabilities(Capabilities {
            progress_flag: true,
            version: None,
        });

        let handler = toolkit.progress_handler(None).await.unwrap();
        assert_eq!(handler.name(), "native");
        assert!(handler.progress_file().unwrap().starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_auto_without_binary_fails() {
        let dir = TempDir::new().unwrap();
        let mut toolkit = Toolkit::new(config(&dir)).unwrap();
        assert!(toolkit.progress_handler(None).await.is_err());
    }

    #[test]
    fn test_resume_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let toolkit = Toolkit::new(config(&dir)).unwrap();
        assert!(matches!(
            toolkit.resume("not-a-portable-id"),
            Err(ExecError::InvalidPortableId { .. })
        ));
    }
}

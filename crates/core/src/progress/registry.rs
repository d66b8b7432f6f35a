//! Maps a configured [`ProgressStrategy`] to a handler constructor.

use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::native::NativeProgress;
use super::stderr::StderrProgress;
use super::traits::ProgressHandler;
use crate::capabilities::Capabilities;
use crate::config::{ConfigError, ProgressStrategy};
use crate::exec::{ExecError, ProcessRunner};

/// What a factory gets to build a handler with.
pub struct HandlerContext<'a> {
    pub runner: &'a ProcessRunner,
    pub capabilities: &'a Capabilities,
    pub expected_duration: Option<Duration>,
}

pub type HandlerFactory = fn(&HandlerContext<'_>) -> Result<Box<dyn ProgressHandler>, ExecError>;

fn native_factory(ctx: &HandlerContext<'_>) -> Result<Box<dyn ProgressHandler>, ExecError> {
    let sidecar = ctx.runner.create_temp_file(".progress")?;
    Ok(Box::new(NativeProgress::temporary(sidecar, ctx.expected_duration)))
}

fn stderr_factory(ctx: &HandlerContext<'_>) -> Result<Box<dyn ProgressHandler>, ExecError> {
    Ok(Box::new(StderrProgress::new(ctx.expected_duration)))
}

/// Registry of progress handler factories.
#[derive(Clone)]
pub struct HandlerRegistry {
    factories: HashMap<ProgressStrategy, HandlerFactory>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ProgressStrategy::Native, native_factory);
        registry.register(ProgressStrategy::Stderr, stderr_factory);
        registry
    }
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers (or replaces) the factory for a concrete strategy.
    pub fn register(&mut self, strategy: ProgressStrategy, factory: HandlerFactory) -> &mut Self {
        self.factories.insert(strategy, factory);
        self
    }

    /// Checks that `strategy` can be served by this registry.
    ///
    /// `Auto` needs the stderr handler as its fallback.
    pub fn validate(&self, strategy: ProgressStrategy) -> Result<(), ConfigError> {
        let required = match strategy {
            ProgressStrategy::Auto => ProgressStrategy::Stderr,
            other => other,
        };
        if self.factories.contains_key(&required) {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(format!(
                "progress.strategy `{}` has no registered handler",
                strategy.as_str()
            )))
        }
    }

    /// Picks the concrete strategy `Auto` stands for.
    pub fn resolve(&self, strategy: ProgressStrategy, capabilities: &Capabilities) -> ProgressStrategy {
        match strategy {
            ProgressStrategy::Auto
                if capabilities.progress_flag
                    && self.factories.contains_key(&ProgressStrategy::Native) =>
            {
                ProgressStrategy::Native
            }
            ProgressStrategy::Auto => ProgressStrategy::Stderr,
            other => other,
        }
    }

    /// Builds a handler for `strategy`.
    pub fn create(
        &self,
        strategy: ProgressStrategy,
        ctx: &HandlerContext<'_>,
    ) -> Result<Box<dyn ProgressHandler>, ExecError> {
        let resolved = self.resolve(strategy, ctx.capabilities);
        let factory = self
            .factories
            .get(&resolved)
            .ok_or_else(|| ExecError::NoHandler {
                strategy: resolved.as_str().to_string(),
            })?;
        debug!(
            requested = strategy.as_str(),
            resolved = resolved.as_str(),
            "Creating progress handler"
        );
        factory(ctx)
    }
}

//! Configuration management for rsbatch batchers.
//!
//! Configuration is layered from multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use rsbatch_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::load("batcher.yaml")?;
//! let users = config
//!     .batcher
//!     .apply(Batcher::builder())
//!     .fetcher(fetch_users)
//!     .resolver(key_resolver(|user: &User| user.id))
//!     .build()?;
//! ```

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::observability::LoggingConfig;
use rsbatch_core::{
    BatcherBuilder, BufferScheduler, ImmediateScheduler, MaxBatchSizeScheduler, Scheduler,
    TracingObserver, WindowScheduler, WindowedBatchScheduler,
};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "RSBATCH";

/// Runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RuntimeConfig {
    /// Batcher settings
    #[serde(default)]
    pub batcher: BatcherSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Settings applied to a [`BatcherBuilder`].
///
/// Overridable with `RSBATCH_BATCHER__*` environment variables, for example
/// `RSBATCH_BATCHER__SCHEDULER__WINDOW_MS=25`.
///
/// # Example YAML Configuration
///
/// ```yaml
/// batcher:
///   name: users
///   trace_events: true
///   scheduler:
///     kind: windowed_batch
///     window_ms: 10
///     max_batch_size: 100
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct BatcherSettings {
    /// Display name; a random `batcher:<hex>` name is generated when unset
    #[serde(default)]
    pub name: Option<String>,

    /// Flush scheduling policy
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Log every lifecycle event through `tracing`
    #[serde(default)]
    pub trace_events: bool,
}

/// Flush scheduling policy, tagged by `kind`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulerSettings {
    /// Flush a fixed time after the first query.
    Window {
        #[serde(default = "default_window_ms")]
        window_ms: u64,
    },
    /// Flush once no query has arrived for `buffer_ms`.
    Buffer {
        #[serde(default = "default_window_ms")]
        buffer_ms: u64,
    },
    /// Window, but flush early once `max_batch_size` queries are queued.
    WindowedBatch {
        #[serde(default = "default_window_ms")]
        window_ms: u64,
        max_batch_size: usize,
    },
    /// Flush only when `max_batch_size` queries are queued (or on demand).
    MaxBatchSize { max_batch_size: usize },
    /// Flush every query on its own.
    Immediate,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::Window {
            window_ms: default_window_ms(),
        }
    }
}

fn default_window_ms() -> u64 {
    rsbatch_core::DEFAULT_WINDOW.as_millis() as u64
}

impl SchedulerSettings {
    /// Builds the scheduler this policy describes.
    pub fn build(&self) -> Arc<dyn Scheduler> {
        match *self {
            Self::Window { window_ms } => {
                Arc::new(WindowScheduler::new(Duration::from_millis(window_ms)))
            }
            Self::Buffer { buffer_ms } => {
                Arc::new(BufferScheduler::new(Duration::from_millis(buffer_ms)))
            }
            Self::WindowedBatch {
                window_ms,
                max_batch_size,
            } => Arc::new(WindowedBatchScheduler::new(
                Duration::from_millis(window_ms),
                max_batch_size,
            )),
            Self::MaxBatchSize { max_batch_size } => {
                Arc::new(MaxBatchSizeScheduler::new(max_batch_size))
            }
            Self::Immediate => Arc::new(ImmediateScheduler),
        }
    }

    fn max_batch_size(&self) -> Option<usize> {
        match *self {
            Self::WindowedBatch { max_batch_size, .. } | Self::MaxBatchSize { max_batch_size } => {
                Some(max_batch_size)
            }
            _ => None,
        }
    }
}

impl BatcherSettings {
    /// Applies name, scheduler and event tracing to `builder`.
    ///
    /// Fetcher and resolver still have to be set by the caller.
    pub fn apply<Q, T, R, E>(
        &self,
        builder: BatcherBuilder<Q, T, R, E>,
    ) -> BatcherBuilder<Q, T, R, E>
    where
        Q: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        T: Send + Sync + 'static,
        R: Send + 'static,
        E: Display + Send + Sync + 'static,
    {
        let mut builder = builder.shared_scheduler(self.scheduler.build());
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if self.trace_events {
            builder = builder.observer(TracingObserver);
        }
        builder
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,

    /// Log batcher internals at `trace` regardless of `level`
    #[serde(default)]
    pub batcher_trace: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            batcher_trace: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingSettings {
    /// Converts these settings into a [`LoggingConfig`].
    ///
    /// An unparsable level falls back to `INFO`; [`RuntimeConfig::validate`]
    /// rejects such levels before this is normally reached.
    pub fn logging_config(&self) -> LoggingConfig {
        let level = Level::from_str(&self.level).unwrap_or(Level::INFO);
        let config = if self.json {
            LoggingConfig::json()
        } else {
            LoggingConfig::text()
        }
        .with_level(level);

        if self.batcher_trace {
            config.with_batcher_trace()
        } else {
            config
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl RuntimeConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `RSBATCH_` and use `__` as
    /// separator. For example:
    /// - `RSBATCH_BATCHER__NAME=users` overrides `batcher.name`
    /// - `RSBATCH_LOGGING__LEVEL=debug` overrides `logging.level`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&RuntimeConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?;

        let runtime_config: RuntimeConfig = config.try_deserialize()?;
        runtime_config.validate()?;

        Ok(runtime_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&RuntimeConfig::default())?)
            .add_source(environment())
            .build()?;

        let runtime_config: RuntimeConfig = config.try_deserialize()?;
        runtime_config.validate()?;

        Ok(runtime_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if let Some(name) = &self.batcher.name {
            if name.trim().is_empty() {
                return Err(ConfigLoadError::Invalid {
                    message: "batcher.name must not be empty when set".to_string(),
                });
            }
        }

        if self.batcher.scheduler.max_batch_size() == Some(0) {
            return Err(ConfigLoadError::Invalid {
                message: "batcher.scheduler.max_batch_size must be greater than 0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}

// RSBATCH_BATCHER__SCHEDULER__KIND -> batcher.scheduler.kind
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

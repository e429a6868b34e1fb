//! rsbatch-runtime: Configuration and logging for rsbatch batchers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rsbatch-runtime               │
//! ├─────────────────────────────────────────────┤
//! │  config.rs      - YAML + env configuration  │
//! │  observability/ - Logging subscriber setup  │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │                rsbatch-core                 │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod observability;

pub use config::{
    BatcherSettings, ConfigLoadError, LoggingSettings, RuntimeConfig, SchedulerSettings,
};
pub use observability::{init_logging, LoggingConfig};

/// Installs logging as described by `config.logging` and registers batcher
/// metric descriptions.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(config: &RuntimeConfig) -> bool {
    rsbatch_core::register_batcher_metrics();
    init_logging(config.logging.logging_config())
}

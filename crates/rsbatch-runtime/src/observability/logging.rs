//! Structured logging configuration.
//!
//! Batchers log through `tracing`; this module installs a `tracing-subscriber`
//! that writes those events as JSON (production) or pretty text
//! (development).
//!
//! # Log Format
//!
//! With JSON formatting, a flush looks like:
//!
//! ```json
//! {"timestamp":"2024-01-15T10:30:00.000Z","level":"DEBUG","fields":{"message":"flushing batch","batcher":"users","seq":3,"batch_size":12},"target":"rsbatch_core::batcher"}
//! ```

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Target under which the batcher core logs.
const CORE_TARGET: &str = "rsbatch_core";

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Whether to use JSON format (true) or text format (false)
    pub json_format: bool,
    /// The default log level if RUST_LOG is not set
    pub default_level: Level,
    /// Whether to include span events (enter/exit)
    pub include_spans: bool,
    /// Whether batcher internals log at `trace` regardless of the default level
    pub batcher_trace: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
            batcher_trace: false,
        }
    }
}

impl LoggingConfig {
    /// Logging configuration for JSON output.
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    /// Logging configuration for text output (development).
    pub fn text() -> Self {
        Self {
            json_format: false,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }

    /// Log every enqueue, flush and settle of every batcher.
    pub fn with_batcher_trace(mut self) -> Self {
        self.batcher_trace = true;
        self
    }

    /// Filter directives used when `RUST_LOG` is not set.
    pub fn directives(&self) -> String {
        let level = self.default_level.as_str().to_lowercase();
        if self.batcher_trace {
            format!("{level},{CORE_TARGET}=trace")
        } else {
            level
        }
    }
}

/// Initialize the logging subsystem with the given configuration.
///
/// Call once at startup. Returns `false` if a global subscriber was already
/// installed, in which case the existing one stays in place.
///
/// ```ignore
/// use rsbatch_runtime::observability::{init_logging, LoggingConfig};
///
/// // Production: JSON format with INFO level
/// init_logging(LoggingConfig::json());
///
/// // Development: text with every batcher event
/// init_logging(LoggingConfig::text().with_batcher_trace());
/// ```
pub fn init_logging(config: LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));

    let span_events = if config.include_spans {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_target(true),
        );
        tracing::subscriber::set_global_default(subscriber).is_ok()
    }
}

/// Creates a JSON subscriber writing to `writer`, capturing everything down
/// to `trace`. Intended for tests that inspect batcher log output.
pub fn create_json_layer<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A writer that captures output to a shared buffer.
    #[derive(Clone)]
    struct CaptureWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl CaptureWriter {
        fn new() -> Self {
            Self {
                buffer: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn get_output(&self) -> String {
            let buffer = self.buffer.lock().unwrap();
            String::from_utf8_lossy(&buffer).to_string()
        }
    }

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.json_format);
        assert_eq!(config.default_level, Level::INFO);
        assert!(!config.include_spans);
        assert!(!config.batcher_trace);
    }

    #[test]
    fn test_logging_config_builders() {
        let config = LoggingConfig::json()
            .with_level(Level::WARN)
            .with_spans()
            .with_batcher_trace();

        assert!(config.json_format);
        assert_eq!(config.default_level, Level::WARN);
        assert!(config.include_spans);
        assert!(config.batcher_trace);
        assert!(!LoggingConfig::text().json_format);
    }

    #[test]
    fn test_directives_add_core_trace_target() {
        assert_eq!(LoggingConfig::default().directives(), "info");
        assert_eq!(
            LoggingConfig::default()
                .with_level(Level::WARN)
                .with_batcher_trace()
                .directives(),
            "warn,rsbatch_core=trace"
        );
    }

    /// Test: Structured logs are JSON formatted
    #[test]
    fn test_structured_logs_are_json_formatted() {
        use tracing::debug;

        let writer = CaptureWriter::new();
        let subscriber = create_json_layer(writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            debug!(batcher = "users", seq = 3u64, batch_size = 12usize, "flushing batch");
        });

        let output = writer.get_output();
        assert!(!output.is_empty(), "Should have captured log output");

        for line in output.lines().filter(|l| !l.is_empty()) {
            let json: serde_json::Value = serde_json::from_str(line)
                .unwrap_or_else(|e| panic!("Log line should be valid JSON: {line} ({e})"));

            assert!(json.get("level").is_some(), "JSON log should have 'level'");
            assert!(json.get("target").is_some(), "JSON log should have 'target'");
            assert_eq!(json["fields"]["batcher"], "users");
            assert_eq!(json["fields"]["seq"], 3);
        }
    }
}

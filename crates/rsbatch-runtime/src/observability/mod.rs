//! Observability setup for applications running batchers.
//!
//! Batchers emit `tracing` events and `metrics` counters on their own; this
//! module wires up the subscriber side.

mod logging;

pub use logging::{create_json_layer, init_logging, LoggingConfig};

//! rsbatch-core: Request coalescing for point lookups
//!
//! This crate turns many concurrent lookups by key into a few bulk fetches:
//! - Batch accumulation with per-window deduplication
//! - Pluggable flush scheduling (window, debounce, size bounded)
//! - Deferred resolution of every caller from one shared bulk result
//! - Optional lifecycle observers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                rsbatch-core                 │
//! ├─────────────────────────────────────────────┤
//! │  scheduler.rs - Flush scheduling policies   │
//! │  deferred.rs  - Settle-once shared futures  │
//! │  batcher/     - Generations & the façade    │
//! │  fetcher.rs   - Bulk fetch seam             │
//! │  resolver.rs  - Per-query result extraction │
//! │  observer.rs  - Lifecycle events            │
//! └─────────────────────────────────────────────┘
//! ```

pub mod batcher;
pub mod deferred;
pub mod error;
pub mod fetcher;
pub mod observer;
pub mod resolver;
pub mod scheduler;

// Re-export commonly used types at the crate root
pub use batcher::{register_batcher_metrics, Batcher, BatcherBuilder};
pub use deferred::{Deferred, DeferredError, DeferredValue};
pub use error::{BatchError, BatchResult, BuildError, ResolveError};
pub use fetcher::Fetcher;
pub use observer::{BatchEvent, BatchObserver, TracingObserver};
pub use resolver::{filter_resolver, indexed_resolver, key_resolver, Resolver};
pub use scheduler::{
    BufferScheduler, ImmediateScheduler, MaxBatchSizeScheduler, Schedule, Scheduler,
    WindowScheduler, WindowedBatchScheduler, DEFAULT_WINDOW,
};

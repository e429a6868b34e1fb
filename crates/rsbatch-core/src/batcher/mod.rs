//! Batch accumulator and the caller-facing batcher.
//!
//! A [`Batcher`] turns many concurrent point lookups into few bulk fetches:
//!
//! 1. **Accumulate**: every `fetch` adds its query to the open generation
//!    (duplicates collapse) and re-consults the scheduler.
//! 2. **Flush**: on timer expiry, an immediate decision or `flush_now`, the
//!    generation is swapped for a fresh one and its queries go to the fetcher
//!    in a single call.
//! 3. **Resolve**: the bulk outcome settles the retired generation's deferred;
//!    each caller then runs the resolver for its own query.
//!
//! Generations are independent. A new one starts accepting queries before the
//! previous bulk fetch settles, so several can be in flight at once.
//!
//! # Example
//!
//! ```ignore
//! use rsbatch_core::{key_resolver, Batcher, WindowScheduler};
//! use std::time::Duration;
//!
//! let users = Batcher::builder()
//!     .name("users")
//!     .fetcher(|ids: Vec<u32>| async move { api.users_by_ids(&ids).await })
//!     .resolver(key_resolver(|user: &User| user.id))
//!     .scheduler(WindowScheduler::new(Duration::from_millis(10)))
//!     .build()?;
//!
//! let (alice, bob) = tokio::join!(users.fetch(2), users.fetch(1));
//! ```

mod builder;
mod generation;

use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::deferred::{DeferredError, DeferredValue};
use crate::error::{BatchError, BatchResult};
use crate::fetcher::Fetcher;
use crate::observer::{BatchEvent, BatchObserver};
use crate::resolver::Resolver;
use crate::scheduler::{Schedule, Scheduler};

pub use builder::BatcherBuilder;
use generation::{FlushTimer, Generation, RetiredGeneration};

/// Coalesces concurrent lookups into batched fetches.
///
/// `Q` is the query type, `T` the bulk fetch result, `R` the per-query result
/// produced by the resolver and `E` the fetcher's error type.
///
/// Cloning a batcher is cheap; clones share the same open generation.
pub struct Batcher<Q, T, R, E> {
    inner: Arc<Inner<Q, T, R, E>>,
}

struct Inner<Q, T, R, E> {
    name: String,
    fetcher: Arc<dyn Fetcher<Q, T, E>>,
    resolver: Arc<dyn Resolver<T, Q, R>>,
    scheduler: Arc<dyn Scheduler>,
    observer: Option<Arc<dyn BatchObserver<Q, T, E>>>,
    runtime: Handle,
    state: Mutex<Generation<Q, T, E>>,
}

impl<Q, T, R, E> Clone for Batcher<Q, T, R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Q, T, R, E> Batcher<Q, T, R, E>
where
    Q: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
    R: Send + 'static,
    E: Display + Send + Sync + 'static,
{
    /// Starts configuring a batcher.
    pub fn builder() -> BatcherBuilder<Q, T, R, E> {
        BatcherBuilder::new()
    }

    /// Queues a lookup and returns a future for its result.
    ///
    /// The query is registered before this method returns, not when the
    /// future is first polled. Dropping the future does not withdraw the
    /// query from its generation.
    pub fn fetch(&self, query: Q) -> impl Future<Output = BatchResult<R, E>> + Send + 'static {
        let (seq, value) = self.inner.enqueue(&query);
        let resolver = Arc::clone(&self.inner.resolver);

        async move {
            let data = value.await.map_err(|err| match err {
                DeferredError::Rejected(err) => BatchError::Fetch(err),
                DeferredError::Dropped => BatchError::Abandoned { seq },
            })?;
            Ok(resolver.resolve(&data, &query)?)
        }
    }

    /// Flushes the open generation now, whatever the scheduler decided.
    ///
    /// Returns `false` when there was nothing to flush.
    pub fn flush_now(&self) -> bool {
        let retired = {
            let mut state = self.inner.state.lock();
            if state.is_empty() {
                return false;
            }
            state.retire()
        };
        self.inner.dispatch(retired);
        true
    }

    /// Name used in logs, metrics and observer events.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Sequence number of the open generation.
    pub fn sequence(&self) -> u64 {
        self.inner.state.lock().seq()
    }

    /// Number of unique queries waiting in the open generation.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().len()
    }
}

impl<Q, T, R, E> std::fmt::Debug for Batcher<Q, T, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("name", &self.inner.name)
            .field("observed", &self.inner.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl<Q, T, R, E> Inner<Q, T, R, E>
where
    Q: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
    R: Send + 'static,
    E: Display + Send + Sync + 'static,
{
    fn new(
        name: String,
        fetcher: Arc<dyn Fetcher<Q, T, E>>,
        resolver: Arc<dyn Resolver<T, Q, R>>,
        scheduler: Arc<dyn Scheduler>,
        observer: Option<Arc<dyn BatchObserver<Q, T, E>>>,
        runtime: Handle,
    ) -> Self {
        let inner = Self {
            name,
            fetcher,
            resolver,
            scheduler,
            observer,
            runtime,
            state: Mutex::new(Generation::new(0)),
        };
        inner.emit(|name| BatchEvent::Created { name, seq: 0 });
        inner
    }

    /// Adds a query to the open generation and acts on the scheduler's
    /// decision. Returns the generation's sequence number and its deferred
    /// bulk result.
    fn enqueue(self: &Arc<Self>, query: &Q) -> (u64, DeferredValue<T, E>) {
        let now = Instant::now();
        metrics::counter!("rsbatch_queries_total", "batcher" => self.name.clone()).increment(1);

        let mut state = self.state.lock();
        state.push(query, now);
        state.cancel_timer();

        let (start, latest) = state.timestamps().unwrap_or((now, now));
        let schedule = self.scheduler.schedule(start, latest, state.len());
        let seq = state.seq();
        let value = state.value();

        // Observers get a snapshot so they never run under the lock.
        let batch = self.observer.as_ref().map(|_| state.queries().to_vec());

        let retired = match schedule {
            Schedule::Immediate => Some(state.retire()),
            Schedule::Delay(delay) => {
                self.arm_timer(&mut state, flush_deadline(latest, delay));
                None
            }
            Schedule::Never => None,
        };
        drop(state);

        trace!(batcher = %self.name, seq, schedule = ?schedule, "query enqueued");
        if let Some(batch) = batch {
            self.emit(|name| BatchEvent::Queued {
                name,
                seq,
                query,
                batch: &batch,
                start,
                latest,
                schedule,
            });
        }

        if let Some(retired) = retired {
            self.dispatch(retired);
        }

        (seq, value)
    }

    /// Spawns a timer that flushes the open generation at `deadline`.
    fn arm_timer(self: &Arc<Self>, state: &mut Generation<Q, T, E>, deadline: Instant) {
        let seq = state.seq();
        let token = state.next_timer_token();
        let inner = Arc::clone(self);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            inner.on_timer(seq, token);
        });
        state.arm(FlushTimer::new(token, handle));
    }

    fn on_timer(&self, seq: u64, token: u64) {
        let retired = {
            let mut state = self.state.lock();
            // A timer cancelled after it already woke up must not flush.
            if state.seq() != seq || !state.is_armed_with(token) {
                return;
            }
            state.release_timer();
            state.retire()
        };
        self.dispatch(retired);
    }

    /// Runs the bulk fetch for a retired generation and settles its deferred.
    fn dispatch(&self, retired: RetiredGeneration<Q, T, E>) {
        let RetiredGeneration {
            seq,
            queries,
            deferred,
        } = retired;

        debug!(batcher = %self.name, seq, batch_size = queries.len(), "flushing batch");
        metrics::counter!("rsbatch_flushes_total", "batcher" => self.name.clone()).increment(1);
        metrics::histogram!("rsbatch_batch_size", "batcher" => self.name.clone())
            .record(queries.len() as f64);

        self.emit(|name| BatchEvent::Fetching {
            name,
            seq,
            batch: &queries,
        });
        self.emit(|name| BatchEvent::Created { name, seq: seq + 1 });

        let fetcher = Arc::clone(&self.fetcher);
        let observer = self.observer.clone();
        let name = self.name.clone();

        self.runtime.spawn(async move {
            match fetcher.fetch(queries).await {
                Ok(data) => {
                    debug!(batcher = %name, seq, "batch fetch resolved");
                    if let Some(observer) = &observer {
                        observer.on_event(&BatchEvent::Data {
                            name: &name,
                            seq,
                            data: &data,
                        });
                    }
                    deferred.resolve(data);
                }
                Err(error) => {
                    warn!(batcher = %name, seq, error = %error, "batch fetch failed");
                    metrics::counter!("rsbatch_fetch_errors_total", "batcher" => name.clone())
                        .increment(1);
                    if let Some(observer) = &observer {
                        observer.on_event(&BatchEvent::Error {
                            name: &name,
                            seq,
                            error: &error,
                        });
                    }
                    deferred.reject(error);
                }
            }
        });
    }

    fn emit<'a, F>(&'a self, event: F)
    where
        F: FnOnce(&'a str) -> BatchEvent<'a, Q, T, E>,
    {
        if let Some(observer) = &self.observer {
            observer.on_event(&event(&self.name));
        }
    }
}

/// Deadline `delay` after `latest`, clamped for delays too large to represent.
fn flush_deadline(latest: Instant, delay: Duration) -> Instant {
    latest
        .checked_add(delay)
        .unwrap_or_else(|| latest + FAR_FUTURE)
}

// About 30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Registers batcher metric descriptions with the installed recorder.
///
/// Optional; call once at startup for documented metrics.
///
/// # Metrics Registered
///
/// - `rsbatch_queries_total` - Queries submitted to a batcher
/// - `rsbatch_flushes_total` - Generations flushed
/// - `rsbatch_fetch_errors_total` - Bulk fetches that failed
/// - `rsbatch_batch_size` - Unique queries per flushed generation
pub fn register_batcher_metrics() {
    metrics::describe_counter!(
        "rsbatch_queries_total",
        "Total number of queries submitted to a batcher"
    );
    metrics::describe_counter!(
        "rsbatch_flushes_total",
        "Total number of batch generations flushed"
    );
    metrics::describe_counter!(
        "rsbatch_fetch_errors_total",
        "Total number of failed bulk fetches"
    );
    metrics::describe_histogram!(
        "rsbatch_batch_size",
        "Number of unique queries per flushed batch"
    );
}

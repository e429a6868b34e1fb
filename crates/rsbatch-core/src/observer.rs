//! Lifecycle notifications for external observers.
//!
//! A batcher built with an observer reports every step of a generation's
//! life: creation, each enqueued query, the flush, and the bulk outcome.
//! Observers are plain callbacks; they run inline on the batcher's code path
//! and must not block. Without an observer no events are constructed.

use std::fmt::{Debug, Display};

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::scheduler::Schedule;

/// A lifecycle event emitted by a batcher.
#[derive(Debug)]
pub enum BatchEvent<'a, Q, T, E> {
    /// A new open generation was installed.
    Created { name: &'a str, seq: u64 },
    /// A query joined the open generation.
    Queued {
        name: &'a str,
        seq: u64,
        query: &'a Q,
        batch: &'a [Q],
        start: Instant,
        latest: Instant,
        schedule: Schedule,
    },
    /// The generation flushed and its bulk fetch is starting.
    Fetching { name: &'a str, seq: u64, batch: &'a [Q] },
    /// The bulk fetch succeeded.
    Data { name: &'a str, seq: u64, data: &'a T },
    /// The bulk fetch failed.
    Error { name: &'a str, seq: u64, error: &'a E },
}

impl<Q, T, E> BatchEvent<'_, Q, T, E> {
    /// Name of the batcher that emitted the event.
    pub fn name(&self) -> &str {
        match self {
            BatchEvent::Created { name, .. }
            | BatchEvent::Queued { name, .. }
            | BatchEvent::Fetching { name, .. }
            | BatchEvent::Data { name, .. }
            | BatchEvent::Error { name, .. } => name,
        }
    }

    /// Sequence number of the generation the event belongs to.
    pub fn seq(&self) -> u64 {
        match self {
            BatchEvent::Created { seq, .. }
            | BatchEvent::Queued { seq, .. }
            | BatchEvent::Fetching { seq, .. }
            | BatchEvent::Data { seq, .. }
            | BatchEvent::Error { seq, .. } => *seq,
        }
    }

    /// Short label for the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchEvent::Created { .. } => "create",
            BatchEvent::Queued { .. } => "queue",
            BatchEvent::Fetching { .. } => "fetch",
            BatchEvent::Data { .. } => "data",
            BatchEvent::Error { .. } => "error",
        }
    }
}

/// Receives batcher lifecycle events.
pub trait BatchObserver<Q, T, E>: Send + Sync + 'static {
    fn on_event(&self, event: &BatchEvent<'_, Q, T, E>);
}

impl<Q, T, E, F> BatchObserver<Q, T, E> for F
where
    F: Fn(&BatchEvent<'_, Q, T, E>) + Send + Sync + 'static,
{
    fn on_event(&self, event: &BatchEvent<'_, Q, T, E>) {
        self(event)
    }
}

/// Observer that writes every event to `tracing` as a `"batcher event"`
/// message with an `event` field holding [`BatchEvent::kind`].
///
/// Successful lifecycle steps are logged at `debug` (enqueues at `trace`),
/// bulk fetch failures at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl<Q, T, E> BatchObserver<Q, T, E> for TracingObserver
where
    Q: Debug,
    E: Display,
{
    fn on_event(&self, event: &BatchEvent<'_, Q, T, E>) {
        let kind = event.kind();
        match event {
            BatchEvent::Created { name, seq } => {
                debug!(batcher = %name, seq, event = kind, "batcher event");
            }
            BatchEvent::Queued {
                name,
                seq,
                query,
                batch,
                start,
                latest,
                schedule,
            } => {
                trace!(
                    batcher = %name,
                    seq,
                    event = kind,
                    query = ?query,
                    batch_size = batch.len(),
                    accumulating_ms = latest.saturating_duration_since(*start).as_millis() as u64,
                    schedule = ?schedule,
                    "batcher event"
                );
            }
            BatchEvent::Fetching { name, seq, batch } => {
                debug!(batcher = %name, seq, event = kind, batch_size = batch.len(), "batcher event");
            }
            BatchEvent::Data { name, seq, .. } => {
                debug!(batcher = %name, seq, event = kind, "batcher event");
            }
            BatchEvent::Error { name, seq, error } => {
                warn!(batcher = %name, seq, event = kind, error = %error, "batcher event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Event<'a> = BatchEvent<'a, u32, Vec<u32>, String>;

    #[test]
    fn test_event_accessors() {
        let batch = [1, 2];
        let error = "boom".to_string();
        let events: [Event<'_>; 3] = [
            BatchEvent::Created { name: "users", seq: 0 },
            BatchEvent::Fetching {
                name: "users",
                seq: 1,
                batch: &batch,
            },
            BatchEvent::Error {
                name: "users",
                seq: 2,
                error: &error,
            },
        ];

        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.name(), e.seq(), e.kind()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("users", 0, "create"),
                ("users", 1, "fetch"),
                ("users", 2, "error")
            ]
        );
    }

    #[test]
    fn test_closure_observer_receives_events() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        let observer = move |event: &Event<'_>| sink.lock().unwrap().push(event.kind());

        observer.on_event(&BatchEvent::Created { name: "users", seq: 0 });
        observer.on_event(&BatchEvent::Data {
            name: "users",
            seq: 0,
            data: &vec![1],
        });

        assert_eq!(*seen.lock().unwrap(), vec!["create", "data"]);
    }
}

//! Flush scheduling policies.
//!
//! A scheduler is consulted every time a query joins the open generation. It
//! looks at when the generation started accumulating, when the latest query
//! arrived and how many unique queries are pending, and decides when the
//! generation should flush.
//!
//! # Policies
//!
//! | Policy                   | Decision                                              |
//! |--------------------------|-------------------------------------------------------|
//! | [`WindowScheduler`]      | flush a fixed window after the first query            |
//! | [`BufferScheduler`]      | flush after a quiet period following the latest query |
//! | [`WindowedBatchScheduler`] | window, but flush at once when the batch is full    |
//! | [`MaxBatchSizeScheduler`] | flush only when the batch is full                    |
//! | [`ImmediateScheduler`]   | flush every query on its own                          |
//!
//! Any `Fn(Instant, Instant, usize) -> Schedule` closure is a scheduler too.

use std::time::Duration;

use tokio::time::Instant;

/// Default window used when a batcher is built without a scheduler.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(10);

/// Decision returned by a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Flush after this delay, measured from now.
    ///
    /// A zero delay flushes on the next runtime tick.
    Delay(Duration),
    /// Flush before `fetch` returns.
    Immediate,
    /// Do not arm a timer; wait for a later decision or a forced flush.
    Never,
}

/// Decides when the open generation flushes.
///
/// Implementations must be pure: the same inputs always give the same
/// decision.
pub trait Scheduler: Send + Sync + 'static {
    /// Computes the schedule for a generation that started accumulating at
    /// `start`, last received a query at `latest` and holds `batch_size`
    /// unique queries (including the one just added).
    fn schedule(&self, start: Instant, latest: Instant, batch_size: usize) -> Schedule;
}

impl<F> Scheduler for F
where
    F: Fn(Instant, Instant, usize) -> Schedule + Send + Sync + 'static,
{
    fn schedule(&self, start: Instant, latest: Instant, batch_size: usize) -> Schedule {
        self(start, latest, batch_size)
    }
}

/// Batches every query made within `window` of the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowScheduler {
    window: Duration,
}

impl WindowScheduler {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for WindowScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Scheduler for WindowScheduler {
    fn schedule(&self, start: Instant, latest: Instant, _batch_size: usize) -> Schedule {
        let spent = latest.saturating_duration_since(start);
        Schedule::Delay(self.window.saturating_sub(spent))
    }
}

/// Debounces: every query pushes the flush back by `buffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferScheduler {
    buffer: Duration,
}

impl BufferScheduler {
    pub fn new(buffer: Duration) -> Self {
        Self { buffer }
    }
}

impl Scheduler for BufferScheduler {
    fn schedule(&self, _start: Instant, _latest: Instant, _batch_size: usize) -> Schedule {
        Schedule::Delay(self.buffer)
    }
}

/// Window scheduling with an early flush once `max_batch_size` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowedBatchScheduler {
    window: WindowScheduler,
    max_batch_size: usize,
}

impl WindowedBatchScheduler {
    pub fn new(window: Duration, max_batch_size: usize) -> Self {
        Self {
            window: WindowScheduler::new(window),
            max_batch_size,
        }
    }
}

impl Scheduler for WindowedBatchScheduler {
    fn schedule(&self, start: Instant, latest: Instant, batch_size: usize) -> Schedule {
        if batch_size >= self.max_batch_size {
            return Schedule::Immediate;
        }
        self.window.schedule(start, latest, batch_size)
    }
}

/// Flushes only when `max_batch_size` unique queries are pending.
///
/// A partially filled generation stays open until it fills up or
/// [`Batcher::flush_now`](crate::Batcher::flush_now) is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxBatchSizeScheduler {
    max_batch_size: usize,
}

impl MaxBatchSizeScheduler {
    pub fn new(max_batch_size: usize) -> Self {
        Self { max_batch_size }
    }
}

impl Scheduler for MaxBatchSizeScheduler {
    fn schedule(&self, _start: Instant, _latest: Instant, batch_size: usize) -> Schedule {
        if batch_size >= self.max_batch_size {
            Schedule::Immediate
        } else {
            Schedule::Never
        }
    }
}

/// Flushes every query as soon as it is submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, _start: Instant, _latest: Instant, _batch_size: usize) -> Schedule {
        Schedule::Immediate
    }
}

//! The open batch generation and its flush timer.

use std::collections::HashSet;
use std::hash::Hash;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::deferred::{Deferred, DeferredValue};

/// Timer task that flushes a generation when it expires.
///
/// Dropping the timer aborts the task, so a generation can never leak a timer
/// when it is re-armed or retired.
#[derive(Debug)]
pub(crate) struct FlushTimer {
    token: u64,
    handle: Option<JoinHandle<()>>,
}

impl FlushTimer {
    pub(crate) fn new(token: u64, handle: JoinHandle<()>) -> Self {
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Detaches the task without aborting it. Used by the timer task itself
    /// once it has fired.
    pub(crate) fn release(mut self) {
        self.handle.take();
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One accumulation cycle: the unique queries gathered since the last flush
/// and the deferred bulk result their callers are waiting on.
pub(crate) struct Generation<Q, T, E> {
    seq: u64,
    queries: Vec<Q>,
    seen: HashSet<Q>,
    deferred: Deferred<T, E>,
    start: Option<Instant>,
    latest: Option<Instant>,
    timer: Option<FlushTimer>,
    next_token: u64,
}

/// What is left of a generation once it has been swapped out for flushing.
pub(crate) struct RetiredGeneration<Q, T, E> {
    pub(crate) seq: u64,
    pub(crate) queries: Vec<Q>,
    pub(crate) deferred: Deferred<T, E>,
}

impl<Q, T, E> Generation<Q, T, E>
where
    Q: Eq + Hash + Clone,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn new(seq: u64) -> Self {
        Self {
            seq,
            queries: Vec::new(),
            seen: HashSet::new(),
            deferred: Deferred::new(),
            start: None,
            latest: None,
            timer: None,
            next_token: 0,
        }
    }

    /// Adds a query, recording `now` as the latest arrival (and as the start
    /// if this is the first query).
    pub(crate) fn push(&mut self, query: &Q, now: Instant) {
        if self.seen.insert(query.clone()) {
            self.queries.push(query.clone());
        }
        self.start.get_or_insert(now);
        self.latest = Some(now);
    }

    /// `(start, latest)` arrival times, once the generation has a query.
    pub(crate) fn timestamps(&self) -> Option<(Instant, Instant)> {
        Some((self.start?, self.latest?))
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn len(&self) -> usize {
        self.queries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub(crate) fn queries(&self) -> &[Q] {
        &self.queries
    }

    pub(crate) fn value(&self) -> DeferredValue<T, E> {
        self.deferred.value()
    }

    /// Hands out a token for the next timer armed on this generation.
    pub(crate) fn next_timer_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Installs a timer, aborting any previous one.
    pub(crate) fn arm(&mut self, timer: FlushTimer) {
        self.timer = Some(timer);
    }

    /// Aborts the armed timer, if any.
    pub(crate) fn cancel_timer(&mut self) {
        self.timer = None;
    }

    /// Whether `token` identifies the currently armed timer.
    pub(crate) fn is_armed_with(&self, token: u64) -> bool {
        self.timer.as_ref().is_some_and(|timer| timer.token == token)
    }

    /// Forgets the armed timer without aborting its task.
    pub(crate) fn release_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.release();
        }
    }

    /// Swaps in the next empty generation and returns this one's parts.
    pub(crate) fn retire(&mut self) -> RetiredGeneration<Q, T, E> {
        let next = Generation::new(self.seq + 1);
        let retired = std::mem::replace(self, next);
        RetiredGeneration {
            seq: retired.seq,
            queries: retired.queries,
            deferred: retired.deferred,
        }
    }
}

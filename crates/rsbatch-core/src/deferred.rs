//! A value that is settled from outside the code that awaits it.
//!
//! [`Deferred`] is the write side: it is resolved or rejected exactly once,
//! consuming itself. [`DeferredValue`] is the read side: it can be cloned and
//! awaited by any number of tasks, all of which observe the same outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{FutureExt, Shared};
use tokio::sync::oneshot;

type Outcome<T, E> = Result<Arc<T>, Arc<E>>;

/// Why a [`DeferredValue`] did not produce a value.
#[derive(Debug)]
pub enum DeferredError<E> {
    /// The deferred was rejected with this error.
    Rejected(Arc<E>),
    /// The deferred was dropped without being settled.
    Dropped,
}

impl<E> Clone for DeferredError<E> {
    fn clone(&self) -> Self {
        match self {
            DeferredError::Rejected(err) => DeferredError::Rejected(Arc::clone(err)),
            DeferredError::Dropped => DeferredError::Dropped,
        }
    }
}

/// Write side of a deferred value.
pub struct Deferred<T, E> {
    tx: oneshot::Sender<Outcome<T, E>>,
    value: DeferredValue<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx,
            value: DeferredValue {
                inner: rx.shared(),
            },
        }
    }

    /// Returns a handle that resolves when this deferred is settled.
    pub fn value(&self) -> DeferredValue<T, E> {
        self.value.clone()
    }

    /// Settles the deferred with a value.
    pub fn resolve(self, value: T) {
        // No awaiters left is fine; the outcome is simply unobserved.
        let _ = self.tx.send(Ok(Arc::new(value)));
    }

    /// Settles the deferred with an error.
    pub fn reject(self, error: E) {
        let _ = self.tx.send(Err(Arc::new(error)));
    }
}

impl<T, E> Default for Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Settling consumes the deferred, so a live one is always pending.
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

/// Read side of a [`Deferred`]; cheap to clone.
pub struct DeferredValue<T, E> {
    inner: Shared<oneshot::Receiver<Outcome<T, E>>>,
}

impl<T, E> DeferredValue<T, E> {
    /// Whether some clone of this value has already been polled to completion.
    ///
    /// This is not a settled check: a value whose deferred was resolved but
    /// that nobody has polled yet still reports `false`.
    pub fn is_observed(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl<T, E> Clone for DeferredValue<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Future for DeferredValue<T, E> {
    type Output = Result<Arc<T>, DeferredError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(Err(err))) => Poll::Ready(Err(DeferredError::Rejected(err))),
            Poll::Ready(Err(_)) => Poll::Ready(Err(DeferredError::Dropped)),
        }
    }
}

//! Error types for batching operations.

use std::sync::Arc;

use thiserror::Error;

/// Errors delivered to a caller awaiting [`Batcher::fetch`](crate::Batcher::fetch).
///
/// `E` is the error type of the bulk fetcher. A failed bulk fetch is shared
/// by every caller of its generation, so it is handed out behind an `Arc`
/// rather than cloned.
#[derive(Debug, Error)]
pub enum BatchError<E> {
    /// The bulk fetch for this caller's generation failed.
    #[error("batch fetch failed: {0}")]
    Fetch(Arc<E>),

    /// The resolver could not derive this caller's result from the bulk result.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The generation was dropped without ever flushing.
    #[error("batch generation {seq} was dropped before it flushed")]
    Abandoned { seq: u64 },
}

impl<E> BatchError<E> {
    /// Returns the shared fetch error, if this is a fetch failure.
    pub fn fetch_error(&self) -> Option<&Arc<E>> {
        match self {
            BatchError::Fetch(err) => Some(err),
            _ => None,
        }
    }
}

// Manual impl: a derive would require `E: Clone`.
impl<E> Clone for BatchError<E> {
    fn clone(&self) -> Self {
        match self {
            BatchError::Fetch(err) => BatchError::Fetch(Arc::clone(err)),
            BatchError::Resolve(err) => BatchError::Resolve(err.clone()),
            BatchError::Abandoned { seq } => BatchError::Abandoned { seq: *seq },
        }
    }
}

/// Failure raised by a resolver for a single query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resolver error: {message}")]
pub struct ResolveError {
    pub message: String,
}

impl ResolveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Misconfiguration detected while building a batcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// No bulk fetch function was supplied.
    #[error("batcher '{name}' has no fetcher configured")]
    MissingFetcher { name: String },

    /// No resolver function was supplied.
    #[error("batcher '{name}' has no resolver configured")]
    MissingResolver { name: String },

    /// No runtime handle was supplied and none is current.
    #[error("batcher '{name}' must be built inside a tokio runtime or given a runtime handle")]
    NoRuntime { name: String },
}

/// Result type for a single batched lookup.
pub type BatchResult<T, E> = Result<T, BatchError<E>>;

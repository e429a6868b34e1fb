//! The bulk fetch seam.

use std::future::Future;

use async_trait::async_trait;

/// Performs one bulk retrieval for a flushed generation.
///
/// Receives the generation's unique queries in insertion order. The result is
/// shared by every caller of that generation; an error is delivered to all of
/// them unchanged. Retries, timeouts and cancellation belong here, not in the
/// batcher.
///
/// Closures `Fn(Vec<Q>) -> impl Future<Output = Result<T, E>>` implement this
/// trait.
#[async_trait]
pub trait Fetcher<Q, T, E>: Send + Sync + 'static {
    async fn fetch(&self, queries: Vec<Q>) -> Result<T, E>;
}

#[async_trait]
impl<Q, T, E, F, Fut> Fetcher<Q, T, E> for F
where
    F: Fn(Vec<Q>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    Q: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    async fn fetch(&self, queries: Vec<Q>) -> Result<T, E> {
        (self)(queries).await
    }
}

//! Builder for [`Batcher`].

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use tokio::runtime::Handle;
use uuid::Uuid;

use super::{Batcher, Inner};
use crate::error::BuildError;
use crate::fetcher::Fetcher;
use crate::observer::BatchObserver;
use crate::resolver::Resolver;
use crate::scheduler::{Scheduler, WindowScheduler};

/// Configures and builds a [`Batcher`].
///
/// A fetcher and a resolver are required. Without a scheduler the batcher
/// uses a 10ms [`WindowScheduler`]; without a name it gets a random
/// `batcher:<hex>` name.
pub struct BatcherBuilder<Q, T, R, E> {
    name: Option<String>,
    fetcher: Option<Arc<dyn Fetcher<Q, T, E>>>,
    resolver: Option<Arc<dyn Resolver<T, Q, R>>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    observer: Option<Arc<dyn BatchObserver<Q, T, E>>>,
    runtime: Option<Handle>,
}

impl<Q, T, R, E> Default for BatcherBuilder<Q, T, R, E> {
    fn default() -> Self {
        Self {
            name: None,
            fetcher: None,
            resolver: None,
            scheduler: None,
            observer: None,
            runtime: None,
        }
    }
}

impl<Q, T, R, E> BatcherBuilder<Q, T, R, E>
where
    Q: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
    R: Send + 'static,
    E: Display + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the display name used in logs, metrics and events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the bulk fetch function.
    pub fn fetcher<F>(mut self, fetcher: F) -> Self
    where
        F: Fetcher<Q, T, E>,
    {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Sets the per-query resolver.
    pub fn resolver<F>(mut self, resolver: F) -> Self
    where
        F: Resolver<T, Q, R>,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Sets the flush scheduling policy.
    pub fn scheduler<S>(mut self, scheduler: S) -> Self
    where
        S: Scheduler,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Sets an already shared scheduling policy.
    pub fn shared_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Attaches a lifecycle observer.
    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: BatchObserver<Q, T, E>,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Runs timers and bulk fetches on this runtime instead of the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Validates the configuration and builds the batcher.
    pub fn build(self) -> Result<Batcher<Q, T, R, E>, BuildError> {
        let name = self.name.unwrap_or_else(generated_name);

        let fetcher = self
            .fetcher
            .ok_or_else(|| BuildError::MissingFetcher { name: name.clone() })?;
        let resolver = self
            .resolver
            .ok_or_else(|| BuildError::MissingResolver { name: name.clone() })?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime { name: name.clone() })?,
        };
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(WindowScheduler::default()));

        Ok(Batcher {
            inner: Arc::new(Inner::new(
                name,
                fetcher,
                resolver,
                scheduler,
                self.observer,
                runtime,
            )),
        })
    }
}

fn generated_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("batcher:{}", &id[..12])
}

//! Builder for constructing Watcher instances.

use crate::core::{Backoff, ValueCache, Watcher};
use crate::sources::{ConfigSource, VariableId};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Default bound on how long session resolution may take.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether the cache is populated before the watch loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priming {
    /// Fetch the current value during `start`, so readers never observe an
    /// absent value once the watcher is running. A failed fetch fails `start`.
    #[default]
    Eager,
    /// Leave the cache empty until the first change notification arrives.
    Lazy,
}

/// Settings shared by a watcher and its background loop.
#[derive(Clone)]
pub(crate) struct WatchOptions {
    pub(crate) priming: Priming,
    pub(crate) resolve_timeout: Duration,
    pub(crate) backoff: Backoff,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<WatchMetrics>,
}

/// Builder for constructing a [`Watcher`].
///
/// # Examples
///
/// ```rust
/// use runtimevar_watch::prelude::*;
/// use std::time::Duration;
///
/// let source = MemorySource::new();
/// let id = VariableId::new("p1", "c1", "v1");
///
/// let watcher = Watcher::builder()
///     .with_priming(Priming::Lazy)
///     .with_resolve_timeout(Duration::from_secs(5))
///     .with_backoff(Backoff::none())
///     .build(source, id, ValueCache::new());
///
/// assert_eq!(watcher.state(), WatchState::Uninitialized);
/// ```
pub struct WatcherBuilder {
    options: WatchOptions,
}

impl WatcherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            options: WatchOptions {
                priming: Priming::default(),
                resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
                backoff: Backoff::default(),
                #[cfg(feature = "metrics")]
                metrics: None,
            },
        }
    }

    /// Choose whether `start` primes the cache with the current value.
    ///
    /// Default is [`Priming::Eager`].
    pub fn with_priming(mut self, priming: Priming) -> Self {
        self.options.priming = priming;
        self
    }

    /// Bound the time `start` waits for session resolution.
    ///
    /// Default is 10 seconds. The steady-state watch loop has no overall timeout.
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.options.resolve_timeout = timeout;
        self
    }

    /// Set the delay policy applied after transient watch errors.
    ///
    /// Default is exponential from 100ms up to 30s.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.options.backoff = backoff;
        self
    }

    /// Record watch loop metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: WatchMetrics) -> Self {
        self.options.metrics = Some(metrics);
        self
    }

    /// Build an unstarted watcher for `id` that publishes into `cache`.
    ///
    /// No I/O happens until [`Watcher::start`] is called.
    pub fn build<S>(self, source: S, id: VariableId, cache: ValueCache) -> Watcher
    where
        S: ConfigSource + 'static,
    {
        Watcher::new(Arc::new(source), id, cache, self.options)
    }
}

impl Default for WatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = WatcherBuilder::new();
        assert_eq!(builder.options.priming, Priming::Eager);
        assert_eq!(builder.options.resolve_timeout, DEFAULT_RESOLVE_TIMEOUT);
        assert_eq!(builder.options.backoff, Backoff::default());
    }

    #[test]
    fn test_builder_accumulates_options() {
        let builder = WatcherBuilder::new()
            .with_priming(Priming::Lazy)
            .with_resolve_timeout(Duration::from_millis(250))
            .with_backoff(Backoff::none());

        assert_eq!(builder.options.priming, Priming::Lazy);
        assert_eq!(builder.options.resolve_timeout, Duration::from_millis(250));
        assert_eq!(builder.options.backoff, Backoff::none());
    }
}

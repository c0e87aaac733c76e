//! Periodic reporting of the cached value.

use crate::core::{ConfigKey, ConfigValue, ValueCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Callback receiving the key and its current value (or `None` if absent).
pub type ReportSink = Arc<dyn Fn(&ConfigKey, Option<&ConfigValue>) + Send + Sync>;

/// Reads one cache entry on a fixed interval and hands it to a sink.
///
/// The reporter only reads the cache. By default each reading is logged at
/// `info` level; [`Reporter::with_sink`] replaces that with any callback.
///
/// # Examples
///
/// ```rust
/// use runtimevar_watch::prelude::*;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let cache = ValueCache::new();
/// let cancel = CancellationToken::new();
///
/// let handle = Reporter::new(cache, ConfigKey::from("v1"), Duration::from_secs(1))
///     .with_sink(|key, value| println!("config key: {}, value: {:?}", key, value))
///     .spawn(cancel.clone());
///
/// cancel.cancel();
/// handle.await.unwrap();
/// # }
/// ```
pub struct Reporter {
    cache: ValueCache,
    key: ConfigKey,
    interval: Duration,
    sink: ReportSink,
}

impl Reporter {
    /// Report `key` from `cache` every `interval`.
    pub fn new(cache: ValueCache, key: ConfigKey, interval: Duration) -> Self {
        Self {
            cache,
            key,
            interval: interval.max(Duration::from_millis(1)),
            sink: Arc::new(log_value),
        }
    }

    /// Replace the default logging sink.
    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&ConfigKey, Option<&ConfigValue>) + Send + Sync + 'static,
    {
        self.sink = Arc::new(sink);
        self
    }

    /// Emit the current value once.
    pub fn report(&self) {
        let value = self.cache.read(self.key.as_str());
        (self.sink)(&self.key, value.as_ref());
    }

    /// Report on every tick until `cancel` fires.
    ///
    /// The first report happens one interval after spawning.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => self.report(),
                }
            }
        })
    }
}

fn log_value(key: &ConfigKey, value: Option<&ConfigValue>) {
    match value {
        Some(value) => tracing::info!(key = %key, value = %value, "Current config value"),
        None => tracing::info!(key = %key, "Config value not yet available"),
    }
}

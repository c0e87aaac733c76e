//! Watch loop metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for a watch loop.
///
/// Tracks applied updates, transient errors, session closes, and the age of
/// the cached value using OpenTelemetry metrics. Every data point carries a
/// `key` attribute naming the watched variable.
///
/// # Examples
///
/// ```rust,no_run
/// use runtimevar_watch::metrics::WatchMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("runtimevar-watch");
/// let metrics = WatchMetrics::new(meter);
///
/// metrics.record_update("v1");
/// metrics.record_value_age("v1");
/// ```
#[derive(Clone)]
pub struct WatchMetrics {
    updates: Counter<u64>,
    transient_errors: Counter<u64>,
    closes: Counter<u64>,
    value_age_seconds: Gauge<f64>,
    last_update: Arc<parking_lot::Mutex<Option<Instant>>>,
}

impl WatchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let updates = meter
            .u64_counter("runtimevar_watch.updates")
            .with_description("Number of values written to the cache")
            .build();

        let transient_errors = meter
            .u64_counter("runtimevar_watch.transient_errors")
            .with_description("Number of failed wait-for-change calls")
            .build();

        let closes = meter
            .u64_counter("runtimevar_watch.closes")
            .with_description("Number of watch sessions released")
            .build();

        let value_age_seconds = meter
            .f64_gauge("runtimevar_watch.value.age")
            .with_description("Time since the cached value was last updated")
            .with_unit("s")
            .build();

        Self {
            updates,
            transient_errors,
            closes,
            value_age_seconds,
            last_update: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Record a value written to the cache.
    pub fn record_update(&self, key: &str) {
        self.updates.add(1, &[KeyValue::new("key", key.to_string())]);
        *self.last_update.lock() = Some(Instant::now());
    }

    /// Record a failed wait that left the cache untouched.
    pub fn record_transient_error(&self, key: &str) {
        self.transient_errors
            .add(1, &[KeyValue::new("key", key.to_string())]);
    }

    /// Record the release of a session.
    pub fn record_close(&self, key: &str) {
        self.closes.add(1, &[KeyValue::new("key", key.to_string())]);
    }

    /// Publish the current age of the cached value, if one was ever written.
    pub fn record_value_age(&self, key: &str) {
        if let Some(age) = self.value_age() {
            self.value_age_seconds
                .record(age.as_secs_f64(), &[KeyValue::new("key", key.to_string())]);
        }
    }

    /// Time since the last recorded update.
    pub fn value_age(&self) -> Option<std::time::Duration> {
        self.last_update.lock().map(|at| at.elapsed())
    }
}

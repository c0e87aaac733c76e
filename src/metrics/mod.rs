//! Built-in metrics for the watch loop.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Values written to the cache
//! - Transient watch errors
//! - Session closes
//! - Age of the cached value
//!
//! # Examples
//!
//! ```rust,no_run
//! use runtimevar_watch::prelude::*;
//! use runtimevar_watch::metrics::WatchMetrics;
//! use opentelemetry::global;
//!
//! let meter = global::meter("my-app");
//!
//! let builder = Watcher::builder().with_metrics(WatchMetrics::new(meter));
//! ```

mod watch_metrics;

pub use watch_metrics::WatchMetrics;

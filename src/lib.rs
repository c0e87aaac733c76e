//! # runtimevar-watch
//!
//! Watch one remote runtime configuration variable and serve its latest value
//! to any number of concurrent readers.
//!
//! ## Overview
//!
//! `runtimevar-watch` is built from three pieces:
//! - [`ValueCache`](core::ValueCache): lock-free reads of the latest value
//!   per key, backed by `arc-swap`
//! - [`Watcher`](core::Watcher): a background task that waits on the remote
//!   subscription and writes every change into the cache
//! - [`ConfigSource`](sources::ConfigSource) / [`Session`](sources::Session):
//!   the provider interface, with in-memory, polling and Google Cloud Runtime
//!   Configurator implementations
//!
//! A failed watch call never erases the cached value: readers keep seeing the
//! last good value until a newer one arrives.
//!
//! ## Quick Start
//!
//! ```rust
//! use runtimevar_watch::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let source = MemorySource::new();
//! let id = VariableId::new("p1", "c1", "v1");
//! source.set(&id, "blue");
//!
//! let cache = ValueCache::new();
//! let mut watcher = Watcher::builder().build(source.clone(), id.clone(), cache.clone());
//! watcher.start().await?;
//!
//! // Zero-cost reads (no locks!)
//! assert_eq!(cache.read("v1").unwrap(), "blue");
//!
//! watcher.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `remote` (default): [`RuntimeConfigSource`](sources::RuntimeConfigSource)
//! - `cli` (default): the `runtimevar-watch` binary
//! - `metrics`: OpenTelemetry metrics for the watch loop

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod report;
pub mod settings;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        Backoff, ConfigKey, ConfigValue, Priming, ValueCache, WatchState, Watcher,
        WatcherBuilder,
    };
    pub use crate::error::{Result, WatchError};
    pub use crate::report::Reporter;
    pub use crate::settings::WatchSettings;
    pub use crate::sources::{
        Change, ConfigSource, MemorySource, PollingSource, Session, VariableId,
    };

    #[cfg(feature = "remote")]
    pub use crate::sources::RuntimeConfigSource;
}

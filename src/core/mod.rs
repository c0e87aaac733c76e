//! Core cache and watcher types.

mod backoff;
mod builder;
mod cache;
mod state;
mod value;
mod watcher;

pub use backoff::Backoff;
pub use builder::{DEFAULT_RESOLVE_TIMEOUT, Priming, WatcherBuilder};
pub use cache::ValueCache;
pub use state::WatchState;
pub use value::{ConfigKey, ConfigValue};
pub use watcher::Watcher;

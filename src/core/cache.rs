//! The latest-value cache shared between the watcher and its readers.

use crate::core::{ConfigKey, ConfigValue};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

type Entries = HashMap<ConfigKey, ConfigValue>;

/// Concurrency-safe store of the most recently known value per key.
///
/// Reads are lock-free loads from an `ArcSwap`; every write publishes a
/// complete new map, so a reader sees either the old map or the new one and
/// never a partial update. There is no way to remove an entry: once a key has
/// been written, reads can only ever observe that value or a later one.
///
/// The handle is cheap to clone and all clones share the same storage.
///
/// # Examples
///
/// ```rust
/// use runtimevar_watch::prelude::*;
///
/// let cache = ValueCache::new();
/// assert!(cache.read("color").is_none());
///
/// cache.write("color", "blue");
/// assert_eq!(cache.read("color").unwrap(), "blue");
/// ```
#[derive(Clone, Default)]
pub struct ValueCache {
    entries: Arc<ArcSwap<Entries>>,
}

impl ValueCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the value stored for `key`.
    ///
    /// Concurrent writers to different keys retry the copy-on-write until
    /// their map is the one published, so no write is lost.
    pub fn write(&self, key: impl Into<ConfigKey>, value: impl Into<ConfigValue>) {
        let key = key.into();
        let value = value.into();
        self.entries.rcu(|current| {
            let mut next = Entries::clone(current);
            next.insert(key.clone(), value.clone());
            next
        });
    }

    /// Most recently written value for `key`, or `None` if it was never written.
    ///
    /// This operation is lock-free and never waits on the writer.
    pub fn read(&self, key: &str) -> Option<ConfigValue> {
        self.entries.load().get(key).cloned()
    }

    /// Whether a value has been written for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.load().contains_key(key)
    }

    /// Number of keys with a value.
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether no key has been written yet.
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// A consistent point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<ConfigKey, ConfigValue> {
        Entries::clone(&self.entries.load())
    }
}

impl std::fmt::Debug for ValueCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.load().iter()).finish()
    }
}

//! In-process configuration source.

use super::{Change, ConfigSource, Session, VariableId};
use crate::core::ConfigValue;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Published state of one in-memory variable.
#[derive(Debug, Clone)]
struct Revision {
    value: Option<ConfigValue>,
    version: u64,
}

/// Configuration source backed by process memory.
///
/// Every variable is a `tokio::sync::watch` channel, so sessions wake up as
/// soon as [`MemorySource::set`] publishes a new value rather than polling.
/// Deleting a variable makes pending waits fail with a transient error while
/// the watcher keeps serving the last good value.
///
/// Clones share the same variables.
///
/// # Examples
///
/// ```rust
/// use runtimevar_watch::sources::{MemorySource, VariableId};
///
/// let source = MemorySource::new();
/// let id = VariableId::new("p1", "c1", "v1");
/// source.set(&id, "blue");
/// assert_eq!(source.get(&id).unwrap(), "blue");
/// ```
#[derive(Clone, Default)]
pub struct MemorySource {
    variables: Arc<Mutex<HashMap<VariableId, watch::Sender<Revision>>>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a variable, waking every session that watches it.
    pub fn set(&self, id: &VariableId, value: impl Into<ConfigValue>) {
        self.publish(id, Some(value.into()));
    }

    /// Mark a variable as deleted.
    ///
    /// Existing sessions see a transient error on their next wait; new
    /// resolutions of `id` fail.
    pub fn delete(&self, id: &VariableId) {
        if self.variables.lock().contains_key(id) {
            self.publish(id, None);
        }
    }

    /// Current value of a variable, if it exists.
    pub fn get(&self, id: &VariableId) -> Option<ConfigValue> {
        self.variables
            .lock()
            .get(id)
            .and_then(|tx| tx.borrow().value.clone())
    }

    fn publish(&self, id: &VariableId, value: Option<ConfigValue>) {
        let mut variables = self.variables.lock();
        match variables.get(id) {
            Some(tx) => {
                tx.send_modify(|revision| {
                    revision.value = value;
                    revision.version += 1;
                });
            }
            None => {
                let (tx, _) = watch::channel(Revision { value, version: 0 });
                variables.insert(id.clone(), tx);
            }
        }
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    async fn resolve(&self, id: &VariableId) -> Result<Box<dyn Session>> {
        let subscription = self.variables.lock().get(id).map(watch::Sender::subscribe);
        let mut rx = subscription
            .ok_or_else(|| WatchError::Resolution(format!("variable {} not found", id)))?;
        if rx.borrow_and_update().value.is_none() {
            return Err(WatchError::Resolution(format!("variable {} was deleted", id)));
        }

        Ok(Box::new(MemorySession {
            id: id.clone(),
            rx,
            closed: false,
        }))
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}

/// Session over one in-memory variable.
struct MemorySession {
    id: VariableId,
    rx: watch::Receiver<Revision>,
    closed: bool,
}

#[async_trait]
impl Session for MemorySession {
    async fn fetch_latest(&mut self) -> Result<ConfigValue> {
        if self.closed {
            return Err(WatchError::Fetch(format!("session for {} is closed", self.id)));
        }
        self.rx
            .borrow()
            .value
            .clone()
            .ok_or_else(|| WatchError::Fetch(format!("variable {} was deleted", self.id)))
    }

    async fn await_change(&mut self) -> Result<Change> {
        if self.closed {
            return Ok(Change::Closed);
        }
        if self.rx.changed().await.is_err() {
            // The source dropped the variable's channel; nothing more will arrive.
            self.closed = true;
            return Ok(Change::Closed);
        }
        let revision = self.rx.borrow_and_update().clone();
        match revision.value {
            Some(value) => Ok(Change::Value(value)),
            None => Err(WatchError::Transient(format!(
                "variable {} was deleted (version {})",
                self.id, revision.version
            ))),
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

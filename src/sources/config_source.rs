//! Configuration source and session traits.

use crate::core::{ConfigKey, ConfigValue};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Fully qualified name of a remote runtime variable.
///
/// The three parts are opaque strings supplied at process start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableId {
    /// Project scope.
    pub project: String,
    /// Configuration-set scope.
    pub config: String,
    /// Variable name within the configuration set.
    pub variable: String,
}

impl VariableId {
    /// Create a variable identifier.
    pub fn new(
        project: impl Into<String>,
        config: impl Into<String>,
        variable: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            config: config.into(),
            variable: variable.into(),
        }
    }

    /// Cache key under which this variable's value is stored.
    pub fn key(&self) -> ConfigKey {
        ConfigKey::new(self.variable.clone())
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/configs/{}/variables/{}",
            self.project, self.config, self.variable
        )
    }
}

/// Outcome of a successful wait on a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The variable has a new value.
    Value(ConfigValue),
    /// The session was closed and will never produce another value.
    Closed,
}

/// A provider that can resolve variable identifiers into live sessions.
///
/// Implement this trait to watch variables held by a custom backend.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Open a subscription to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Resolution`](crate::error::WatchError::Resolution)
    /// if the variable does not exist, access is denied, or the provider is
    /// unreachable.
    async fn resolve(&self, id: &VariableId) -> Result<Box<dyn Session>>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;
}

/// A live subscription to one variable.
///
/// A session is owned by exactly one watch loop, which is also the only
/// caller of [`Session::close`].
#[async_trait]
pub trait Session: Send {
    /// Return the current value. May be called any number of times.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Fetch`](crate::error::WatchError::Fetch) if the
    /// value cannot be read.
    async fn fetch_latest(&mut self) -> Result<ConfigValue>;

    /// Block until the value changes or the session is closed.
    ///
    /// After [`Session::close`] this must return [`Change::Closed`]. It must be
    /// safe to call in a tight loop.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Transient`](crate::error::WatchError::Transient)
    /// when a single wait failed but the subscription remains usable.
    async fn await_change(&mut self) -> Result<Change>;

    /// Release the subscription. Calling it more than once has no further effect.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_id_display() {
        let id = VariableId::new("p1", "c1", "v1");
        assert_eq!(id.to_string(), "projects/p1/configs/c1/variables/v1");
    }

    #[test]
    fn test_variable_id_key() {
        let id = VariableId::new("p1", "c1", "v1");
        assert_eq!(id.key(), ConfigKey::from("v1"));
    }
}

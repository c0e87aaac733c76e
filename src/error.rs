//! Error types for runtimevar-watch.

use std::time::Duration;

/// Result type alias for runtimevar-watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while resolving, priming, or watching a variable.
///
/// Sources report recoverable wait failures as [`WatchError::Transient`]. The
/// other variants are surfaced by [`Watcher::start`](crate::core::Watcher::start)
/// or by setup code.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The variable identifier could not be mapped to a live subscription.
    #[error("Failed to resolve variable: {0}")]
    Resolution(String),

    /// Resolution did not complete within the caller-supplied timeout.
    #[error("Timed out resolving variable after {0:?}")]
    ResolveTimeout(Duration),

    /// Fetching the current value failed.
    #[error("Failed to fetch latest value: {0}")]
    Fetch(String),

    /// A single wait-for-change call failed; the subscription is still usable.
    #[error("Transient watch error: {0}")]
    Transient(String),

    /// The watcher has already stopped and cannot be started again.
    #[error("Watcher is stopped")]
    Stopped,

    /// Another `start` call is still resolving the variable.
    #[error("Watcher is already starting")]
    Starting,

    /// Process settings are missing or malformed.
    #[error("Invalid settings: {0}")]
    Settings(String),
}

impl WatchError {
    /// Whether the watch loop may keep going after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<config::ConfigError> for WatchError {
    fn from(err: config::ConfigError) -> Self {
        WatchError::Settings(err.to_string())
    }
}

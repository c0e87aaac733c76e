//! Lifecycle states of a watcher.

use std::fmt;

/// Where a [`Watcher`](crate::core::Watcher) is in its lifecycle.
///
/// Transitions only move forward:
/// `Uninitialized → Initializing → Running → Stopped`, with a direct
/// `Initializing → Stopped` edge when resolution or priming fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Built but not started.
    Uninitialized,
    /// Resolving the session and, if requested, priming the cache.
    Initializing,
    /// The background watch loop is live.
    Running,
    /// The session has been released; no further cache writes happen.
    Stopped,
}

impl WatchState {
    /// Whether this state is terminal.
    pub fn is_stopped(self) -> bool {
        self == Self::Stopped
    }
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

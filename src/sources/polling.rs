//! Fixed-interval polling adapter for sources without a blocking wait.

use super::{Change, ConfigSource, Session, VariableId};
use crate::core::ConfigValue;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Wraps a source so that waiting for a change is done by polling.
///
/// This is a degraded substitute for a real long-poll: changes are noticed
/// at most once per `interval`, and two updates landing between polls are
/// seen as one. Use it only when the underlying provider offers nothing
/// better than fetching the current value.
///
/// # Examples
///
/// ```rust
/// use runtimevar_watch::sources::{MemorySource, PollingSource};
/// use std::time::Duration;
///
/// let source = PollingSource::new(MemorySource::new(), Duration::from_secs(1));
/// assert_eq!(source.interval(), Duration::from_secs(1));
/// ```
pub struct PollingSource<S> {
    inner: S,
    interval: Duration,
}

impl<S: ConfigSource> PollingSource<S> {
    /// Poll `inner` every `interval`. A zero interval is raised to one millisecond.
    pub fn new(inner: S, interval: Duration) -> Self {
        Self {
            inner,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Time between polls.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl<S: ConfigSource> ConfigSource for PollingSource<S> {
    async fn resolve(&self, id: &VariableId) -> Result<Box<dyn Session>> {
        let inner = self.inner.resolve(id).await?;
        Ok(Box::new(PollingSession::new(inner, self.interval)))
    }

    fn name(&self) -> String {
        format!("poll({:?}):{}", self.interval, self.inner.name())
    }
}

/// Session whose `await_change` polls `fetch_latest` on a timer.
pub struct PollingSession {
    inner: Box<dyn Session>,
    ticker: Interval,
    last_seen: Option<ConfigValue>,
    closed: bool,
}

impl PollingSession {
    /// Poll `inner` every `interval`.
    pub fn new(inner: Box<dyn Session>, interval: Duration) -> Self {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            inner,
            ticker,
            last_seen: None,
            closed: false,
        }
    }
}

#[async_trait]
impl Session for PollingSession {
    async fn fetch_latest(&mut self) -> Result<ConfigValue> {
        let value = self.inner.fetch_latest().await?;
        self.last_seen = Some(value.clone());
        Ok(value)
    }

    async fn await_change(&mut self) -> Result<Change> {
        loop {
            if self.closed {
                return Ok(Change::Closed);
            }
            self.ticker.tick().await;

            let value = match self.inner.fetch_latest().await {
                Ok(value) => value,
                Err(e) => return Err(WatchError::Transient(e.to_string())),
            };
            if self.last_seen.as_ref() != Some(&value) {
                self.last_seen = Some(value.clone());
                return Ok(Change::Value(value));
            }
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemorySource;

    fn id() -> VariableId {
        VariableId::new("p1", "c1", "v1")
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_reports_only_changes() {
        let memory = MemorySource::new();
        memory.set(&id(), "blue");
        let source = PollingSource::new(memory.clone(), Duration::from_millis(100));
        let mut session = source.resolve(&id()).await.unwrap();

        assert_eq!(session.fetch_latest().await.unwrap(), "blue");

        let writer = memory.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            writer.set(&id(), "green");
        });

        let change = session.await_change().await.unwrap();
        assert_eq!(change, Change::Value(ConfigValue::from("green")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_reports_current_value_without_priming() {
        let memory = MemorySource::new();
        memory.set(&id(), "blue");
        let source = PollingSource::new(memory, Duration::from_millis(100));
        let mut session = source.resolve(&id()).await.unwrap();

        let change = session.await_change().await.unwrap();
        assert_eq!(change, Change::Value(ConfigValue::from("blue")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_is_transient() {
        let memory = MemorySource::new();
        memory.set(&id(), "blue");
        let source = PollingSource::new(memory.clone(), Duration::from_millis(100));
        let mut session = source.resolve(&id()).await.unwrap();
        session.fetch_latest().await.unwrap();

        memory.delete(&id());
        let err = session.await_change().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_close_ends_polling() {
        let memory = MemorySource::new();
        memory.set(&id(), "blue");
        let source = PollingSource::new(memory, Duration::from_millis(100));
        let mut session = source.resolve(&id()).await.unwrap();

        session.close().await;
        assert_eq!(session.await_change().await.unwrap(), Change::Closed);
    }

    #[test]
    fn test_name() {
        let source = PollingSource::new(MemorySource::new(), Duration::from_secs(1));
        assert_eq!(source.name(), "poll(1s):memory");
    }
}

//! Background watch loop keeping the cache fresh.

use crate::core::builder::WatchOptions;
use crate::core::{Backoff, ConfigKey, Priming, ValueCache, WatchState, WatcherBuilder};
use crate::error::{Result, WatchError};
use crate::sources::{Change, ConfigSource, Session, VariableId};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Keeps one cached variable in sync with its remote source.
///
/// A watcher resolves a [`Session`] when started, optionally primes the cache
/// with the current value, and then runs a background task that writes every
/// change into the [`ValueCache`]. It is the only writer for its key.
///
/// Transient watch errors are logged and retried; they never touch the cached
/// value. The task ends when the session reports it is closed or when
/// [`Watcher::stop`] is called, and it releases the session on every exit path.
///
/// # Examples
///
/// ```rust
/// use runtimevar_watch::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let source = MemorySource::new();
/// let id = VariableId::new("p1", "c1", "v1");
/// source.set(&id, "blue");
///
/// let cache = ValueCache::new();
/// let mut watcher = Watcher::builder().build(source.clone(), id.clone(), cache.clone());
/// watcher.start().await?;
/// assert_eq!(cache.read("v1").unwrap(), "blue");
///
/// watcher.stop().await;
/// assert_eq!(watcher.state(), WatchState::Stopped);
/// # Ok(())
/// # }
/// ```
pub struct Watcher {
    source: Arc<dyn ConfigSource>,
    id: VariableId,
    key: ConfigKey,
    cache: ValueCache,
    options: WatchOptions,
    state: watch::Sender<WatchState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Create a new builder for constructing a watcher.
    pub fn builder() -> WatcherBuilder {
        WatcherBuilder::new()
    }

    pub(crate) fn new(
        source: Arc<dyn ConfigSource>,
        id: VariableId,
        cache: ValueCache,
        options: WatchOptions,
    ) -> Self {
        let (state, _) = watch::channel(WatchState::Uninitialized);
        Self {
            key: id.key(),
            source,
            id,
            cache,
            options,
            state,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Resolve the session and launch the background watch loop.
    ///
    /// Calling `start` on a running watcher does nothing. If the returned
    /// future is dropped before it completes, the watcher ends up
    /// [`WatchState::Stopped`] and any resolved session is closed in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the watcher [`WatchState::Stopped`] if:
    /// - Resolution fails or exceeds the resolve timeout
    /// - Eager priming is configured and the initial fetch fails
    ///
    /// Returns [`WatchError::Stopped`] if the watcher has already stopped.
    pub async fn start(&mut self) -> Result<()> {
        match self.state() {
            WatchState::Uninitialized => {}
            WatchState::Running => return Ok(()),
            WatchState::Initializing => return Err(WatchError::Starting),
            WatchState::Stopped => return Err(WatchError::Stopped),
        }
        self.state.send_replace(WatchState::Initializing);
        let mut pending = PendingStart {
            state: self.state.clone(),
            session: None,
            armed: true,
            #[cfg(feature = "metrics")]
            metrics: self.options.metrics.clone(),
            key: self.key.clone(),
        };

        tracing::info!(
            variable = %self.id,
            source = %self.source.name(),
            "Resolving variable"
        );

        let timeout = self.options.resolve_timeout;
        let session = match tokio::time::timeout(timeout, self.source.resolve(&self.id)).await {
            Ok(Ok(session)) => pending.hold(session),
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => return Err(self.fail(WatchError::ResolveTimeout(timeout))),
        };

        if self.options.priming == Priming::Eager {
            match session.fetch_latest().await {
                Ok(value) => {
                    tracing::debug!(key = %self.key, value = %value, "Primed cache");
                    self.cache.write(self.key.clone(), value);
                    #[cfg(feature = "metrics")]
                    if let Some(metrics) = &self.options.metrics {
                        metrics.record_update(self.key.as_str());
                    }
                }
                Err(e) => {
                    pending.close().await;
                    return Err(self.fail(e));
                }
            }
        }

        let watch_loop = WatchLoop {
            key: self.key.clone(),
            cache: self.cache.clone(),
            backoff: self.options.backoff,
            state: self.state.clone(),
            cancel: self.cancel.clone(),
            #[cfg(feature = "metrics")]
            metrics: self.options.metrics.clone(),
        };

        let Some(session) = pending.disarm() else {
            return Err(self.fail(WatchError::Resolution("session lost during start".into())));
        };
        // Published before spawning so the task's final `Stopped` always wins.
        self.state.send_replace(WatchState::Running);
        self.task = Some(tokio::spawn(watch_loop.run(session)));

        tracing::info!(variable = %self.id, "Watching variable");
        Ok(())
    }

    /// Stop the background loop and release the session.
    ///
    /// Interrupts a pending wait, then waits for the task to close the
    /// session. After this returns no further cache writes happen. Safe to
    /// call more than once or on a watcher that never started.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(variable = %self.id, error = %e, "Watch task failed");
            }
        }
        self.state.send_replace(WatchState::Stopped);
    }

    /// Wait until the watcher reaches [`WatchState::Stopped`].
    ///
    /// Resolves when the source closes the session as well as after `stop`.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| state.is_stopped()).await;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<WatchState> {
        self.state.subscribe()
    }

    /// Identifier of the watched variable.
    pub fn id(&self) -> &VariableId {
        &self.id
    }

    /// Cache key the watcher writes to.
    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    /// Read handle to the cache the watcher writes to.
    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    fn fail(&self, err: WatchError) -> WatchError {
        tracing::error!(variable = %self.id, error = %err, "Failed to start watching");
        self.state.send_replace(WatchState::Stopped);
        err
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        // The task notices and closes its session on its own.
        self.cancel.cancel();
    }
}

/// Unwinds a `start` call that never reached `Running`.
///
/// Dropping it while armed publishes `Stopped` and closes the held session on
/// a background task, so a cancelled `start` neither wedges the state machine
/// nor leaks the session.
struct PendingStart {
    state: watch::Sender<WatchState>,
    session: Option<Box<dyn Session>>,
    armed: bool,
    key: ConfigKey,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

impl PendingStart {
    fn hold(&mut self, session: Box<dyn Session>) -> &mut Box<dyn Session> {
        self.session.insert(session)
    }

    /// Close the held session in place.
    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_close(self.key.as_str());
            }
        }
    }

    /// Hand the session over to the watch loop.
    fn disarm(&mut self) -> Option<Box<dyn Session>> {
        self.armed = false;
        self.session.take()
    }
}

impl Drop for PendingStart {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.state.send_replace(WatchState::Stopped);

        let Some(mut session) = self.session.take() else {
            return;
        };
        let key = self.key.clone();
        #[cfg(feature = "metrics")]
        let metrics = self.metrics.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(key = %key, "Start abandoned, closing session");
                handle.spawn(async move {
                    session.close().await;
                    #[cfg(feature = "metrics")]
                    if let Some(metrics) = &metrics {
                        metrics.record_close(key.as_str());
                    }
                });
            }
            Err(_) => {
                tracing::warn!(key = %key, "Start abandoned outside a runtime, session not closed");
            }
        }
    }
}

/// State owned by the spawned watch task.
struct WatchLoop {
    key: ConfigKey,
    cache: ValueCache,
    backoff: Backoff,
    state: watch::Sender<WatchState>,
    cancel: CancellationToken,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

impl WatchLoop {
    async fn run(self, mut session: Box<dyn Session>) {
        let mut failures: u32 = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(key = %self.key, "Watch cancelled");
                    break;
                }
                outcome = session.await_change() => outcome,
            };

            match outcome {
                Ok(Change::Value(value)) => {
                    failures = 0;
                    tracing::debug!(key = %self.key, value = %value, "Variable updated");
                    self.cache.write(self.key.clone(), value);
                    #[cfg(feature = "metrics")]
                    if let Some(metrics) = &self.metrics {
                        metrics.record_update(self.key.as_str());
                        metrics.record_value_age(self.key.as_str());
                    }
                }
                Ok(Change::Closed) => {
                    tracing::info!(key = %self.key, "Watch session closed");
                    break;
                }
                Err(e) => {
                    // The last good value stays authoritative.
                    failures = failures.saturating_add(1);
                    tracing::warn!(
                        key = %self.key,
                        error = %e,
                        failures,
                        "Error watching variable"
                    );
                    #[cfg(feature = "metrics")]
                    if let Some(metrics) = &self.metrics {
                        metrics.record_transient_error(self.key.as_str());
                        metrics.record_value_age(self.key.as_str());
                    }

                    if !self.pause(self.backoff.delay(failures)).await {
                        break;
                    }
                }
            }
        }

        session.close().await;
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_close(self.key.as_str());
        }
        self.state.send_replace(WatchState::Stopped);
    }

    /// Sleep before the next attempt. Returns `false` if cancelled meanwhile.
    async fn pause(&self, delay: std::time::Duration) -> bool {
        if delay.is_zero() {
            // Keep a source that fails instantly from starving the runtime.
            tokio::task::yield_now().await;
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

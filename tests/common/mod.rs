//! Scripted configuration source shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use runtimevar_watch::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long a test waits on the watch loop before giving up.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// One outcome handed to the next `await_change` call.
#[derive(Debug, Clone)]
pub enum Step {
    Value(&'static str),
    Error(&'static str),
    Closed,
}

enum ResolveBehavior {
    Succeed,
    Fail(&'static str),
    Hang,
}

struct Shared {
    latest: Mutex<Option<&'static str>>,
    hang_fetch: AtomicBool,
    steps: Mutex<Option<mpsc::UnboundedReceiver<Step>>>,
    acks: mpsc::UnboundedSender<()>,
    resolves: AtomicUsize,
    fetches: AtomicUsize,
    waits: AtomicUsize,
    closes: AtomicUsize,
}

/// Source whose single session replays steps pushed by the test.
pub struct ScriptedSource {
    shared: Arc<Shared>,
    resolve: ResolveBehavior,
}

/// Test-side handle driving a [`ScriptedSource`].
pub struct Script {
    steps: mpsc::UnboundedSender<Step>,
    acks: mpsc::UnboundedReceiver<()>,
    shared: Arc<Shared>,
}

impl ScriptedSource {
    pub fn new() -> (Self, Script) {
        let (steps_tx, steps_rx) = mpsc::unbounded_channel();
        let (acks_tx, acks_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            latest: Mutex::new(None),
            hang_fetch: AtomicBool::new(false),
            steps: Mutex::new(Some(steps_rx)),
            acks: acks_tx,
            resolves: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            waits: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        });
        let script = Script {
            steps: steps_tx,
            acks: acks_rx,
            shared: Arc::clone(&shared),
        };
        (
            Self {
                shared,
                resolve: ResolveBehavior::Succeed,
            },
            script,
        )
    }

    /// Value returned by `fetch_latest`; without one, fetches fail.
    pub fn with_latest(self, value: &'static str) -> Self {
        *self.shared.latest.lock() = Some(value);
        self
    }

    /// Make `fetch_latest` block forever.
    pub fn hanging_fetch(self) -> Self {
        self.shared.hang_fetch.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_resolve(mut self, reason: &'static str) -> Self {
        self.resolve = ResolveBehavior::Fail(reason);
        self
    }

    pub fn hanging_resolve(mut self) -> Self {
        self.resolve = ResolveBehavior::Hang;
        self
    }
}

#[async_trait]
impl ConfigSource for ScriptedSource {
    async fn resolve(&self, id: &VariableId) -> Result<Box<dyn Session>> {
        self.shared.resolves.fetch_add(1, Ordering::SeqCst);
        match self.resolve {
            ResolveBehavior::Succeed => {}
            ResolveBehavior::Fail(reason) => {
                return Err(WatchError::Resolution(format!("{}: {}", id, reason)));
            }
            ResolveBehavior::Hang => std::future::pending::<()>().await,
        }

        let steps = self
            .shared
            .steps
            .lock()
            .take()
            .ok_or_else(|| WatchError::Resolution("already resolved".into()))?;
        Ok(Box::new(ScriptedSession {
            shared: Arc::clone(&self.shared),
            steps,
            closed: false,
        }))
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

struct ScriptedSession {
    shared: Arc<Shared>,
    steps: mpsc::UnboundedReceiver<Step>,
    closed: bool,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn fetch_latest(&mut self) -> Result<ConfigValue> {
        self.shared.fetches.fetch_add(1, Ordering::SeqCst);
        if self.shared.hang_fetch.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let latest = *self.shared.latest.lock();
        latest
            .map(ConfigValue::from)
            .ok_or_else(|| WatchError::Fetch("no value".into()))
    }

    async fn await_change(&mut self) -> Result<Change> {
        if self.closed {
            return Ok(Change::Closed);
        }
        self.shared.waits.fetch_add(1, Ordering::SeqCst);
        let _ = self.shared.acks.send(());

        match self.steps.recv().await {
            Some(Step::Value(value)) => Ok(Change::Value(ConfigValue::from(value))),
            Some(Step::Error(reason)) => Err(WatchError::Transient(reason.to_string())),
            Some(Step::Closed) => {
                self.closed = true;
                Ok(Change::Closed)
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Script {
    /// Queue a step without waiting for it to be consumed.
    pub fn push(&self, step: Step) {
        self.steps.send(step).expect("session receiver dropped");
    }

    /// Wait until the watch loop is blocked in `await_change`.
    pub async fn waiting(&mut self) {
        tokio::time::timeout(STEP_TIMEOUT, self.acks.recv())
            .await
            .expect("watch loop did not call await_change in time")
            .expect("source dropped");
    }

    /// Hand one step to the loop and wait until it has been fully processed.
    pub async fn step(&mut self, step: Step) {
        self.push(step);
        self.waiting().await;
    }

    pub fn resolves(&self) -> usize {
        self.shared.resolves.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.shared.fetches.load(Ordering::SeqCst)
    }

    pub fn waits(&self) -> usize {
        self.shared.waits.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}

/// Identifier used throughout the scenarios.
pub fn variable() -> VariableId {
    VariableId::new("p1", "c1", "v1")
}

/// Wait for the watcher to stop, failing the test if it takes too long.
pub async fn wait_stopped(watcher: &Watcher) {
    tokio::time::timeout(STEP_TIMEOUT, watcher.stopped())
        .await
        .expect("watcher did not stop in time");
}

/// Wait until the source has seen `expected` session closes.
pub async fn wait_for_closes(script: &Script, expected: usize) {
    let result = tokio::time::timeout(STEP_TIMEOUT, async {
        while script.closes() < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        result.is_ok(),
        "expected {} session closes, saw {}",
        expected,
        script.closes()
    );
}

/// Poll `cache` until `key` holds `expected`.
pub async fn wait_for_value(cache: &ValueCache, key: &str, expected: &str) {
    let result = tokio::time::timeout(STEP_TIMEOUT, async {
        while cache.read(key).as_deref() != Some(expected) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        result.is_ok(),
        "cache never held {:?} for {}, last value {:?}",
        expected,
        key,
        cache.read(key)
    );
}

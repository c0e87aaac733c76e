//! Process settings loaded from the environment.

use crate::core::{Backoff, Priming};
use crate::error::{Result, WatchError};
use crate::sources::VariableId;
use config::Environment;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Unprefixed variables naming the watched variable.
const IDENTIFIER_VARS: [&str; 3] = ["PROJECT", "CONFIG", "VARIABLE"];

/// Prefix for tuning variables, e.g. `WATCH_RESOLVE_TIMEOUT_SECS`.
const TUNING_PREFIX: &str = "WATCH";

/// Tuning variables holding numbers or flags.
const PARSED_TUNING_VARS: [&str; 6] = [
    "WATCH_RESOLVE_TIMEOUT_SECS",
    "WATCH_REPORT_INTERVAL_SECS",
    "WATCH_PRIME",
    "WATCH_BACKOFF_INITIAL_MS",
    "WATCH_BACKOFF_MAX_MS",
    "WATCH_RUN_FOR_SECS",
];

/// Tuning variables taken verbatim.
const TEXT_TUNING_VARS: [&str; 2] = ["WATCH_ACCESS_TOKEN", "WATCH_ENDPOINT"];

/// Settings for a watcher process, built once at startup and passed down.
///
/// The variable identifier comes from `PROJECT`, `CONFIG` and `VARIABLE`.
/// Everything else is optional and read from `WATCH_`-prefixed variables:
///
/// | Variable | Default |
/// |---|---|
/// | `WATCH_RESOLVE_TIMEOUT_SECS` | 10 |
/// | `WATCH_REPORT_INTERVAL_SECS` | 1 |
/// | `WATCH_PRIME` | true |
/// | `WATCH_BACKOFF_INITIAL_MS` | 100 |
/// | `WATCH_BACKOFF_MAX_MS` | 30000 |
/// | `WATCH_RUN_FOR_SECS` | unset (run until signalled) |
/// | `WATCH_ACCESS_TOKEN` | unset |
/// | `WATCH_ENDPOINT` | unset (public API) |
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSettings {
    project: Option<String>,
    config: Option<String>,
    variable: Option<String>,
    resolve_timeout_secs: u64,
    report_interval_secs: u64,
    prime: bool,
    backoff_initial_ms: u64,
    backoff_max_ms: u64,
    run_for_secs: Option<u64>,
    access_token: Option<String>,
    endpoint: Option<String>,
}

impl WatchSettings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Settings`] if an identifier is missing or a
    /// tuning value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load settings from an explicit set of variables.
    ///
    /// # Errors
    ///
    /// Same as [`WatchSettings::from_env`].
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let pick = |names: &[&str]| -> config::Map<String, String> {
            vars.iter()
                .filter(|(name, _)| names.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        };

        let settings: Self = config::Config::builder()
            .set_default("resolve_timeout_secs", 10_i64)?
            .set_default("report_interval_secs", 1_i64)?
            .set_default("prime", true)?
            .set_default("backoff_initial_ms", 100_i64)?
            .set_default("backoff_max_ms", 30_000_i64)?
            .add_source(Environment::default().source(Some(pick(&IDENTIFIER_VARS[..]))))
            .add_source(
                Environment::with_prefix(TUNING_PREFIX)
                    .try_parsing(true)
                    .source(Some(pick(&PARSED_TUNING_VARS[..]))),
            )
            .add_source(
                Environment::with_prefix(TUNING_PREFIX).source(Some(pick(&TEXT_TUNING_VARS[..]))),
            )
            .build()?
            .try_deserialize()?;

        settings.variable_id()?;
        Ok(settings)
    }

    /// Identifier of the variable to watch.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Settings`] naming the first missing identifier.
    pub fn variable_id(&self) -> Result<VariableId> {
        let required = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| WatchError::Settings(format!("{} must be set", name)))
        };
        Ok(VariableId::new(
            required(&self.project, "PROJECT")?,
            required(&self.config, "CONFIG")?,
            required(&self.variable, "VARIABLE")?,
        ))
    }

    /// Bound on session resolution at startup.
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Interval between status reports.
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }

    /// Whether to fetch the current value before watching.
    pub fn priming(&self) -> Priming {
        if self.prime { Priming::Eager } else { Priming::Lazy }
    }

    /// Delay policy after transient watch errors.
    pub fn backoff(&self) -> Backoff {
        if self.backoff_initial_ms == 0 {
            return Backoff::none();
        }
        Backoff::exponential(
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Fixed run time, if the process should exit on its own.
    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.map(Duration::from_secs)
    }

    /// OAuth2 bearer token for the remote API.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Alternative API root for the remote source.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

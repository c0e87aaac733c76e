//! Google Cloud Runtime Configurator source.

use super::{Change, ConfigSource, Session, VariableId};
use crate::core::ConfigValue;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public Runtime Configurator endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://runtimeconfig.googleapis.com/v1beta1";

/// Shortest time between two `:watch` requests that both report no change.
const MIN_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Runtime Configurator variable as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Variable {
    #[serde(default)]
    name: String,
    text: Option<String>,
    value: Option<String>,
    update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    state: VariableState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum VariableState {
    #[default]
    VariableStateUnspecified,
    Updated,
    Deleted,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    newer_than: Option<DateTime<Utc>>,
}

impl Variable {
    /// Decode the payload as a string.
    ///
    /// `text` variables are used as-is. Binary variables carry base64 in
    /// `value` and must decode to UTF-8.
    fn decode(&self) -> std::result::Result<ConfigValue, String> {
        match (&self.text, &self.value) {
            (Some(text), _) => Ok(ConfigValue::from(text.as_str())),
            (None, Some(encoded)) => {
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| format!("variable {} has malformed base64 value: {}", self.name, e))?;
                String::from_utf8(bytes)
                    .map(ConfigValue::from)
                    .map_err(|_| format!("variable {} value is not valid UTF-8", self.name))
            }
            (None, None) => Ok(ConfigValue::from("")),
        }
    }
}

/// Configuration source backed by the Google Cloud Runtime Configurator API.
///
/// Resolution and fetches are plain `GET`s of the variable; waiting for a
/// change uses the API's `:watch` long-poll, which returns when the variable
/// is updated or deleted, or after the server-side timeout with no change.
/// Binary variables are decoded from base64 and must hold UTF-8.
///
/// # Examples
///
/// ```rust,no_run
/// use runtimevar_watch::sources::RuntimeConfigSource;
/// use std::time::Duration;
///
/// # fn example() -> runtimevar_watch::error::Result<()> {
/// let source = RuntimeConfigSource::builder()
///     .with_auth_token("ya29.token")
///     .with_timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RuntimeConfigSource {
    api: Api,
}

impl RuntimeConfigSource {
    /// Create a new builder for constructing a Runtime Configurator source.
    pub fn builder() -> RuntimeConfigSourceBuilder {
        RuntimeConfigSourceBuilder::new()
    }

    /// Endpoint the source talks to.
    pub fn endpoint(&self) -> &str {
        &self.api.endpoint
    }
}

#[async_trait]
impl ConfigSource for RuntimeConfigSource {
    async fn resolve(&self, id: &VariableId) -> Result<Box<dyn Session>> {
        let url = self.api.variable_url(id);
        let variable = self
            .api
            .send(self.api.client.get(&url))
            .await
            .map_err(|e| match e {
                ApiError::Status(StatusCode::NOT_FOUND) => {
                    WatchError::Resolution(format!("variable {} not found", id))
                }
                ApiError::Status(status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)) => {
                    WatchError::Resolution(format!("permission denied for {}: {}", id, status))
                }
                other => WatchError::Resolution(format!("{}: {}", id, other)),
            })?;

        tracing::debug!(
            variable = %id,
            update_time = ?variable.update_time,
            "Resolved runtime config variable"
        );

        Ok(Box::new(RuntimeConfigSession {
            api: self.api.clone(),
            url,
            last_update: variable.update_time,
            closed: false,
        }))
    }

    fn name(&self) -> String {
        format!("runtimeconfig:{}", self.api.endpoint)
    }
}

/// Session over one Runtime Configurator variable.
struct RuntimeConfigSession {
    api: Api,
    url: String,
    last_update: Option<DateTime<Utc>>,
    closed: bool,
}

impl RuntimeConfigSession {
    /// Turn a `:watch` response into a change, or `None` if nothing changed.
    fn classify(&mut self, variable: Variable) -> Option<Result<Change>> {
        match variable.state {
            VariableState::Deleted => Some(Err(WatchError::Transient(format!(
                "variable {} was deleted",
                variable.name
            )))),
            VariableState::Updated => Some(self.accept(variable)),
            VariableState::VariableStateUnspecified => {
                let newer = match (variable.update_time, self.last_update) {
                    (Some(seen), Some(last)) => seen > last,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                newer.then(|| self.accept(variable))
            }
        }
    }

    fn accept(&mut self, variable: Variable) -> Result<Change> {
        if variable.update_time.is_some() {
            self.last_update = variable.update_time;
        }
        variable
            .decode()
            .map(Change::Value)
            .map_err(WatchError::Transient)
    }
}

#[async_trait]
impl Session for RuntimeConfigSession {
    async fn fetch_latest(&mut self) -> Result<ConfigValue> {
        let variable = self
            .api
            .send(self.api.client.get(&self.url))
            .await
            .map_err(|e| WatchError::Fetch(e.to_string()))?;

        let value = variable.decode().map_err(WatchError::Fetch)?;
        if variable.update_time.is_some() {
            self.last_update = variable.update_time;
        }
        Ok(value)
    }

    async fn await_change(&mut self) -> Result<Change> {
        loop {
            if self.closed {
                return Ok(Change::Closed);
            }

            let started = tokio::time::Instant::now();
            let body = WatchRequest {
                newer_than: self.last_update,
            };
            let request = self
                .api
                .client
                .post(format!("{}:watch", self.url))
                .timeout(self.api.watch_timeout)
                .json(&body);

            let variable = self
                .api
                .send(request)
                .await
                .map_err(|e| WatchError::Transient(e.to_string()))?;

            if let Some(outcome) = self.classify(variable) {
                return outcome;
            }
            tracing::trace!(url = %self.url, "Watch timed out without a change");
            if let Some(delay) = rewatch_delay(started.elapsed()) {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Remaining wait before re-posting a `:watch` that answered early with no change.
fn rewatch_delay(elapsed: Duration) -> Option<Duration> {
    MIN_WATCH_INTERVAL
        .checked_sub(elapsed)
        .filter(|delay| !delay.is_zero())
}

/// Failure talking to the API, before it is mapped to a watch error.
#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP request failed with status {0}")]
    Status(StatusCode),
}

/// HTTP plumbing shared by the source and its sessions.
#[derive(Clone)]
struct Api {
    client: Client,
    endpoint: String,
    token: Option<String>,
    watch_timeout: Duration,
}

impl Api {
    fn variable_url(&self, id: &VariableId) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), id)
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<Variable, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }
        Ok(response.json::<Variable>().await?)
    }
}

/// Builder for constructing a `RuntimeConfigSource`.
pub struct RuntimeConfigSourceBuilder {
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
    watch_timeout: Duration,
}

impl RuntimeConfigSourceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            timeout: Duration::from_secs(10),
            // The server holds a watch for up to 60 seconds.
            watch_timeout: Duration::from_secs(90),
        }
    }

    /// Talk to a different API root, such as an emulator.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set an OAuth2 bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the timeout for resolve and fetch requests.
    ///
    /// Default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout for a single `:watch` long-poll.
    ///
    /// Default is 90 seconds.
    pub fn with_watch_timeout(mut self, timeout: Duration) -> Self {
        self.watch_timeout = timeout;
        self
    }

    /// Build the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<RuntimeConfigSource> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| WatchError::Settings(format!("Failed to create HTTP client: {}", e)))?;

        Ok(RuntimeConfigSource {
            api: Api {
                client,
                endpoint: self.endpoint,
                token: self.token,
                watch_timeout: self.watch_timeout,
            },
        })
    }
}

impl Default for RuntimeConfigSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

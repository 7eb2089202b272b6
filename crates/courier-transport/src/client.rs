//! HTTP Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use courier_core::{Ack, Action, Transport, TransportError, TransportResult, Update, UpdateId};

use crate::envelope::{interpret, parse_ack, parse_updates};
use crate::request::{GetUpdates, action_request};

/// Default Bot API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Settings for [`BotApiClient`].
#[derive(Clone)]
pub struct BotApiConfig {
    /// Endpoint without trailing slash, e.g. `https://api.telegram.org`.
    pub base_url: String,
    /// Bot token. Never logged.
    pub token: String,
    /// Extra HTTP time on top of the long-poll timeout.
    pub request_margin: Duration,
    /// Maximum updates per `getUpdates` call (1..=100).
    pub limit: u8,
    /// Update types to request; empty means the platform default.
    pub allowed_updates: Vec<String>,
    /// Time limit for send calls.
    pub send_timeout: Duration,
}

impl BotApiConfig {
    /// Creates settings with defaults for everything but the token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            request_margin: Duration::from_secs(10),
            limit: 100,
            allowed_updates: Vec::new(),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for BotApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("request_margin", &self.request_margin)
            .field("limit", &self.limit)
            .field("allowed_updates", &self.allowed_updates)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

/// [`Transport`] over the HTTP Bot API.
///
/// Each call is a single request; retries belong to the poll loop.
#[derive(Debug, Clone)]
pub struct BotApiClient {
    client: Client,
    config: BotApiConfig,
}

impl BotApiClient {
    /// Creates a client.
    pub fn new(config: BotApiConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::network(e.without_url().to_string()))?;

        Ok(Self { client, config })
    }

    /// Returns the client settings.
    pub fn config(&self) -> &BotApiConfig {
        &self.config
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    /// Calls `method` with a JSON body and returns the envelope's `result`.
    pub async fn call<B>(&self, method: &str, body: &B, timeout: Duration) -> TransportResult<Value>
    where
        B: Serialize + ?Sized,
    {
        trace!(method, "Calling Bot API");

        // reqwest errors embed the URL, which contains the token.
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await.map_err(request_error)?;

        interpret(status, retry_after.as_deref(), &bytes)
    }
}

fn request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::network("request timed out")
    } else {
        TransportError::network(e.without_url().to_string())
    }
}

#[async_trait]
impl Transport for BotApiClient {
    async fn fetch(&self, cursor: UpdateId, timeout: Duration) -> TransportResult<Vec<Update>> {
        let body = GetUpdates {
            offset: cursor,
            timeout: timeout.as_secs(),
            limit: self.config.limit,
            allowed_updates: &self.config.allowed_updates,
        };

        let result = self
            .call("getUpdates", &body, timeout + self.config.request_margin)
            .await?;
        let updates = parse_updates(result)?;

        debug!(cursor, count = updates.len(), "Fetched updates");
        Ok(updates)
    }

    async fn send(&self, action: Action) -> TransportResult<Ack> {
        let (method, body) = action_request(&action);
        let result = self.call(method, &body, self.config.send_timeout).await?;
        Ok(parse_ack(&result))
    }
}

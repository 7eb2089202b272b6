//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    /// Bot API endpoint and credentials.
    #[serde(default)]
    pub api: ApiConfig,

    /// Long-poll settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Delay policy after failed fetches.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Handler execution settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Cursor persistence.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// API
// =============================================================================

/// Bot API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Endpoint, e.g. `https://api.telegram.org`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bot token.
    #[serde(default)]
    pub token: String,

    /// Extra HTTP time on top of the long-poll timeout, in seconds.
    #[serde(default = "default_request_margin_secs")]
    pub request_margin_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            request_margin_secs: default_request_margin_secs(),
        }
    }
}

impl ApiConfig {
    /// Returns the request margin as a [`Duration`].
    pub fn request_margin(&self) -> Duration {
        Duration::from_secs(self.request_margin_secs)
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("request_margin_secs", &self.request_margin_secs)
            .finish()
    }
}

fn default_base_url() -> String {
    courier_transport::DEFAULT_BASE_URL.to_string()
}

fn default_request_margin_secs() -> u64 {
    10
}

// =============================================================================
// Polling
// =============================================================================

/// Long-poll settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// How long the platform may hold a fetch open, in seconds (1..=300).
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum updates per fetch (1..=100).
    #[serde(default = "default_limit")]
    pub limit: u8,

    /// Update types to receive; empty means the platform default.
    #[serde(default)]
    pub allowed_updates: Vec<String>,

    /// Cursor to start from. Overrides any checkpoint.
    #[serde(default)]
    pub initial_cursor: Option<i64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout_secs(),
            limit: default_limit(),
            allowed_updates: Vec::new(),
            initial_cursor: None,
        }
    }
}

impl PollingConfig {
    /// Returns the long-poll timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_limit() -> u8 {
    100
}

// =============================================================================
// Backoff
// =============================================================================

/// Exponential backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first failure, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the computed delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor per consecutive failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Random spread as a fraction of the delay, in `[0, 1)`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

// =============================================================================
// Dispatch
// =============================================================================

/// Handler execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Time limit for handlers whose route sets none, in milliseconds.
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    /// Handlers run concurrently within a batch; 1 means sequential.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: default_handler_timeout_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl DispatchConfig {
    /// Returns the handler timeout as a [`Duration`].
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}

fn default_handler_timeout_ms() -> u64 {
    30_000
}

fn default_max_in_flight() -> usize {
    1
}

// =============================================================================
// Checkpoint
// =============================================================================

/// Cursor persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// JSON file holding the cursor. No persistence when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the lowercase level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a [`tracing::Level`].
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` otherwise.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level, overridden by `RUST_LOG` when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file for `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-module levels, e.g. `courier_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line in each record.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,
}

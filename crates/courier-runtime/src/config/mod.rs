//! Configuration module for the Courier runtime.
//!
//! Layered TOML/environment loading through figment, plus validation of
//! poll, backoff and dispatch settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ApiConfig, BackoffConfig, CheckpointConfig, CourierConfig, DispatchConfig, LogFormat,
    LogLevel, LogOutput, LoggingConfig, PollingConfig, SpanEventConfig,
};
pub use validation::{validate_api_config, validate_config, validate_engine_config};

//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ApiConfig, BackoffConfig, CourierConfig, DispatchConfig, PollingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_api_config(&config.api)?;
    validate_engine_config(config)
}

/// Validates everything except the `api` section.
///
/// Used when the transport is supplied programmatically rather than built
/// from `api`.
pub fn validate_engine_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_polling_config(&config.polling)?;
    validate_backoff_config(&config.backoff)?;
    validate_dispatch_config(&config.dispatch)?;
    Ok(())
}

/// Validates the Bot API endpoint and token.
pub fn validate_api_config(api: &ApiConfig) -> ConfigResult<()> {
    if api.token.trim().is_empty() {
        return Err(ConfigError::missing_field("api.token"));
    }
    if api.token.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ConfigError::validation(
            "api.token must not contain whitespace or '/'",
        ));
    }

    let url = api.base_url.as_str();
    let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    else {
        return Err(ConfigError::invalid_url(url, "scheme must be http or https"));
    };
    if rest.trim_end_matches('/').is_empty() {
        return Err(ConfigError::invalid_url(url, "missing host"));
    }

    Ok(())
}

fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if !(1..=300).contains(&polling.timeout_secs) {
        return Err(ConfigError::validation(format!(
            "polling.timeout_secs must be between 1 and 300, got {}",
            polling.timeout_secs
        )));
    }

    if !(1..=100).contains(&polling.limit) {
        return Err(ConfigError::validation(format!(
            "polling.limit must be between 1 and 100, got {}",
            polling.limit
        )));
    }

    if let Some(cursor) = polling.initial_cursor
        && cursor < 0
    {
        return Err(ConfigError::validation(format!(
            "polling.initial_cursor must not be negative, got {cursor}"
        )));
    }

    Ok(())
}

fn validate_backoff_config(backoff: &BackoffConfig) -> ConfigResult<()> {
    if backoff.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "backoff.initial_delay_ms must be greater than 0",
        ));
    }

    if backoff.max_delay_ms < backoff.initial_delay_ms {
        return Err(ConfigError::validation(
            "backoff.max_delay_ms must be greater than or equal to initial_delay_ms",
        ));
    }

    if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
        return Err(ConfigError::validation(
            "backoff.multiplier must be at least 1.0",
        ));
    }

    if !(0.0..1.0).contains(&backoff.jitter) {
        return Err(ConfigError::validation(
            "backoff.jitter must be in [0, 1)",
        ));
    }

    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.handler_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "dispatch.handler_timeout_ms must be greater than 0",
        ));
    }

    if dispatch.max_in_flight == 0 {
        return Err(ConfigError::validation(
            "dispatch.max_in_flight must be at least 1",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CourierConfig {
        let mut config = CourierConfig::default();
        config.api.token = "123:abc".into();
        config
    }

    #[test]
    fn test_defaults_with_token_are_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_empty_token_is_rejected() {
        let err = validate_config(&CourierConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
        assert!(validate_engine_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_url_is_rejected() {
        let mut config = valid();
        config.api.base_url = "ftp://example.org".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        config.api.base_url = "https://".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_poll_timeout_bounds() {
        let mut config = valid();
        config.polling.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
        config.polling.timeout_secs = 301;
        assert!(validate_config(&config).is_err());
        config.polling.timeout_secs = 300;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_negative_initial_cursor_is_rejected() {
        let mut config = valid();
        config.polling.initial_cursor = Some(-1);
        assert!(validate_config(&config).is_err());
        config.polling.initial_cursor = Some(0);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = valid();
        config.backoff.max_delay_ms = 10;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.backoff.multiplier = 0.5;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.backoff.jitter = 1.0;
        assert!(validate_config(&config).is_err());
    }
}

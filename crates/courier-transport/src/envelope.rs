//! Bot API response envelope.
//!
//! Every Bot API method answers with `{"ok": bool, "result": ..., ...}`.
//! [`interpret`] maps an HTTP status, an optional `Retry-After` header and the
//! raw body to either the `result` value or a [`TransportError`]. It performs
//! no I/O, so the whole mapping is unit tested.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use courier_core::{Ack, TransportError, TransportResult, Update};

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Maps a raw HTTP response to the envelope's `result`.
///
/// | Condition                         | Outcome                      |
/// |-----------------------------------|------------------------------|
/// | `ok: true` with a `result`        | `Ok(result)`                 |
/// | code 401 or 404                   | `Unauthorized`               |
/// | code 429                          | `RateLimited`                |
/// | code 409 or 5xx                   | `Network`                    |
/// | any other `ok: false`             | `Rejected`                   |
/// | body is not an envelope           | by status, else `Malformed`  |
///
/// The code is the envelope's `error_code`, falling back to the HTTP status.
/// The suggested delay comes from `parameters.retry_after`, falling back to
/// the `Retry-After` header.
pub fn interpret(status: u16, retry_after_header: Option<&str>, body: &[u8]) -> TransportResult<Value> {
    let header_delay = retry_after_header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    let envelope = match serde_json::from_slice::<Envelope>(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            let description = format!("HTTP {status}");
            return Err(match classify(status, description, header_delay) {
                TransportError::Rejected { .. } => {
                    TransportError::malformed(format!("invalid response envelope: {e}"))
                }
                other => other,
            });
        }
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| TransportError::malformed("response has no result"));
    }

    let code = envelope.error_code.unwrap_or(status);
    let description = envelope
        .description
        .unwrap_or_else(|| format!("HTTP {status}"));
    let delay = envelope
        .parameters
        .and_then(|p| p.retry_after)
        .map(Duration::from_secs)
        .or(header_delay);

    Err(classify(code, description, delay))
}

fn classify(code: u16, description: String, retry_after: Option<Duration>) -> TransportError {
    match code {
        401 | 404 => TransportError::Unauthorized(description),
        429 => TransportError::rate_limited(retry_after),
        409 | 500..=599 => TransportError::network(format!("{code}: {description}")),
        _ => TransportError::Rejected { code, description },
    }
}

/// Converts a `getUpdates` result into updates sorted by id.
///
/// Elements without an integer `update_id` cannot be confirmed through the
/// offset, so they are logged and skipped. A result that is not an array is
/// [`Malformed`](TransportError::Malformed).
pub fn parse_updates(result: Value) -> TransportResult<Vec<Update>> {
    let Value::Array(items) = result else {
        return Err(TransportError::malformed("getUpdates result is not an array"));
    };

    let mut updates: Vec<Update> = items
        .into_iter()
        .filter_map(|item| match item.get("update_id").and_then(Value::as_i64) {
            Some(id) => Some(Update::new(id, item)),
            None => {
                warn!(raw = %item, "Skipping update without a valid update_id");
                None
            }
        })
        .collect();

    updates.sort_by_key(Update::id);
    Ok(updates)
}

/// Builds an [`Ack`] from a send-style result.
///
/// Methods that return a `Message` yield its id; methods that return `true`
/// yield an empty ack.
pub fn parse_ack(result: &Value) -> Ack {
    Ack {
        message_id: result.get("message_id").and_then(Value::as_i64),
    }
}

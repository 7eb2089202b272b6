//! Raw updates as delivered by the transport.

use std::time::SystemTime;

use serde_json::Value;

/// Identifier of an update. Strictly increasing across one stream.
pub type UpdateId = i64;

/// A raw update fetched from the platform.
///
/// The payload is kept opaque until the decoder turns it into an
/// [`Event`](crate::Event). Updates are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    id: UpdateId,
    payload: Value,
    received_at: SystemTime,
}

impl Update {
    /// Creates an update stamped with the current local time.
    pub fn new(id: UpdateId, payload: Value) -> Self {
        Self {
            id,
            payload,
            received_at: SystemTime::now(),
        }
    }

    /// Creates an update with an explicit receive timestamp.
    pub fn with_received_at(id: UpdateId, payload: Value, received_at: SystemTime) -> Self {
        Self {
            id,
            payload,
            received_at,
        }
    }

    /// The update id.
    pub fn id(&self) -> UpdateId {
        self.id
    }

    /// The raw payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// When this process received the update. Observability only.
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }
}

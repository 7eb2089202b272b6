//! Shared fixtures for this crate's unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use courier_core::{
    Ack, Action, Event, Transport, TransportResult, Update, UpdateId, decode,
};

/// Transport that records sent actions and never returns updates.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<Action>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn sent(&self) -> Vec<Action> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn fetch(&self, _cursor: UpdateId, _timeout: Duration) -> TransportResult<Vec<Update>> {
        Ok(Vec::new())
    }

    async fn send(&self, action: Action) -> TransportResult<Ack> {
        self.sent.lock().push(action);
        Ok(Ack::default())
    }
}

pub(crate) fn text_event(id: UpdateId, text: &str) -> Event {
    decode(&Update::new(
        id,
        json!({"message": {"message_id": id, "chat": {"id": 100}, "text": text}}),
    ))
}

pub(crate) fn button_event(id: UpdateId, data: &str) -> Event {
    decode(&Update::new(
        id,
        json!({
            "callback_query": {
                "id": format!("cb-{id}"),
                "from": {"id": 1, "first_name": "Ann"},
                "data": data,
                "message": {"message_id": 50, "chat": {"id": 100}}
            }
        }),
    ))
}

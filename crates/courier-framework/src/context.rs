//! Handler context.
//!
//! Every handler invocation receives an [`EventContext`]: the decoded
//! [`Event`] plus a [`Responder`] bound to the event's chat, message and
//! callback. Both are cheap to clone.

use std::sync::Arc;

use tracing::debug;

use courier_core::{
    Ack, Action, BoxedTransport, Event, InlineKeyboard, TransportError, TransportResult,
};

// =============================================================================
// Responder
// =============================================================================

/// Output capability handed to handlers.
///
/// Wraps the transport and remembers where the current event came from, so
/// replies do not need explicit ids. Helpers that need an id the event does
/// not carry return [`TransportError::Rejected`] without touching the network.
#[derive(Clone)]
pub struct Responder {
    transport: BoxedTransport,
    chat_id: Option<i64>,
    message_id: Option<i64>,
    callback_id: Option<String>,
}

impl Responder {
    /// Creates a responder bound to the origin of `event`.
    pub fn for_event(transport: BoxedTransport, event: &Event) -> Self {
        let (message_id, callback_id) = match event {
            Event::Message(msg) => (Some(msg.message_id), None),
            Event::Button(button) => (button.message_id, Some(button.callback_id.clone())),
            Event::Unknown(_) => (None, None),
        };
        Self {
            transport,
            chat_id: event.chat_id(),
            message_id,
            callback_id,
        }
    }

    /// Returns the chat replies go to, if the event has one.
    pub fn chat_id(&self) -> Option<i64> {
        self.chat_id
    }

    /// Returns the message the event originated from, if any.
    ///
    /// For button presses this is the message the keyboard was attached to.
    pub fn message_id(&self) -> Option<i64> {
        self.message_id
    }

    /// Sends an arbitrary action.
    pub async fn send(&self, action: Action) -> TransportResult<Ack> {
        debug!(target_kind = ?action.target(), "Sending action");
        self.transport.send(action).await
    }

    /// Sends a text message to the event's chat.
    pub async fn reply_text(&self, text: impl Into<String>) -> TransportResult<Ack> {
        let chat_id = self.require_chat()?;
        self.send(Action::send_text(chat_id, text)).await
    }

    /// Sends a text message with an inline keyboard to the event's chat.
    pub async fn reply_with_keyboard(
        &self,
        text: impl Into<String>,
        keyboard: InlineKeyboard,
    ) -> TransportResult<Ack> {
        let chat_id = self.require_chat()?;
        self.send(Action::send_text(chat_id, text).with_keyboard(keyboard))
            .await
    }

    /// Replaces the text of the originating message and removes its keyboard.
    pub async fn edit_text(&self, text: impl Into<String>) -> TransportResult<Ack> {
        let chat_id = self.require_chat()?;
        let message_id = self
            .message_id
            .ok_or_else(|| missing("event has no message to edit"))?;
        self.send(Action::edit_text(chat_id, message_id, text)).await
    }

    /// Acknowledges the originating button press, optionally with a toast.
    pub async fn answer(&self, text: Option<String>) -> TransportResult<Ack> {
        let callback_id = self
            .callback_id
            .clone()
            .ok_or_else(|| missing("event is not a button press"))?;
        self.send(Action::AnswerButton { callback_id, text }).await
    }

    fn require_chat(&self) -> TransportResult<i64> {
        self.chat_id
            .ok_or_else(|| missing("event has no chat to reply to"))
    }
}

fn missing(description: &str) -> TransportError {
    TransportError::Rejected {
        code: 400,
        description: description.to_string(),
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("chat_id", &self.chat_id)
            .field("message_id", &self.message_id)
            .field("callback_id", &self.callback_id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// EventContext
// =============================================================================

/// The context passed to handlers.
#[derive(Debug, Clone)]
pub struct EventContext {
    event: Arc<Event>,
    responder: Responder,
}

impl EventContext {
    /// Creates a context for `event`, replying through `transport`.
    pub fn new(event: Arc<Event>, transport: BoxedTransport) -> Self {
        let responder = Responder::for_event(transport, &event);
        Self { event, responder }
    }

    /// Returns the event being handled.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Returns a clone of the shared event.
    pub fn event_arc(&self) -> Arc<Event> {
        Arc::clone(&self.event)
    }

    /// Returns the responder for this event.
    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    /// Returns the id of the update being handled.
    pub fn update_id(&self) -> i64 {
        self.event.update_id()
    }
}

//! Update decoder.
//!
//! [`decode`] is total: it never fails and never panics. A payload is parsed
//! into a minimal view of the Bot API `Update` object in a single pass; if that
//! view does not describe a text message or a button press, the update decodes
//! to [`Event::Unknown`] carrying the raw payload.

use serde::Deserialize;

use crate::foundation::event::{ButtonAction, Event, TextMessage, UnknownPayload, User};
use crate::foundation::update::Update;

#[derive(Debug, Deserialize)]
struct RawUpdate {
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    edited_message: Option<RawMessage>,
    #[serde(default)]
    channel_post: Option<RawMessage>,
    #[serde(default)]
    edited_channel_post: Option<RawMessage>,
    #[serde(default)]
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    message_id: i64,
    chat: RawChat,
    #[serde(default)]
    date: i64,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<RawCallbackMessage>,
}

/// The message a keyboard was attached to. May be "inaccessible", in which
/// case only the id and chat are present.
#[derive(Debug, Deserialize)]
struct RawCallbackMessage {
    message_id: i64,
    chat: RawChat,
}

/// Decodes an update into a typed [`Event`].
///
/// Pure and side-effect free. Recognised shapes, in priority order:
///
/// 1. `message`, `edited_message`, `channel_post`, `edited_channel_post`
///    carrying `text` → [`Event::Message`]
/// 2. `callback_query` → [`Event::Button`]
///
/// Everything else, including payloads that fail to parse, becomes
/// [`Event::Unknown`].
pub fn decode(update: &Update) -> Event {
    let unknown = || {
        Event::Unknown(UnknownPayload {
            update_id: update.id(),
            raw: update.payload().clone(),
        })
    };

    let Ok(raw) = RawUpdate::deserialize(update.payload()) else {
        return unknown();
    };

    let message = raw
        .message
        .or(raw.edited_message)
        .or(raw.channel_post)
        .or(raw.edited_channel_post);

    if let Some(msg) = message {
        return match msg.text {
            Some(text) => Event::Message(TextMessage {
                update_id: update.id(),
                message_id: msg.message_id,
                chat_id: msg.chat.id,
                from: msg.from,
                text,
                date: msg.date,
            }),
            None => unknown(),
        };
    }

    if let Some(query) = raw.callback_query {
        let (chat_id, message_id) = match query.message {
            Some(m) => (Some(m.chat.id), Some(m.message_id)),
            None => (None, None),
        };
        return Event::Button(ButtonAction {
            update_id: update.id(),
            callback_id: query.id,
            from: query.from,
            data: query.data,
            chat_id,
            message_id,
        });
    }

    unknown()
}

//! Bot API request bodies.

use serde::Serialize;
use serde_json::{Value, json};

use courier_core::{Action, UpdateId};

/// Body of a `getUpdates` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetUpdates<'a> {
    /// First update id to return.
    pub offset: UpdateId,
    /// Long-poll timeout in seconds.
    pub timeout: u64,
    /// Maximum number of updates to return.
    pub limit: u8,
    /// Update types to receive; empty means the platform default.
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub allowed_updates: &'a [String],
}

/// Returns the Bot API method and JSON body for `action`.
pub fn action_request(action: &Action) -> (&'static str, Value) {
    match action {
        Action::SendText {
            chat_id,
            text,
            keyboard,
            disable_preview,
        } => {
            let mut body = json!({"chat_id": chat_id, "text": text});
            if let Some(keyboard) = keyboard {
                body["reply_markup"] = json!(keyboard);
            }
            if *disable_preview {
                body["link_preview_options"] = json!({"is_disabled": true});
            }
            ("sendMessage", body)
        }
        Action::EditText {
            chat_id,
            message_id,
            text,
            keyboard,
        } => {
            let mut body = json!({"chat_id": chat_id, "message_id": message_id, "text": text});
            if let Some(keyboard) = keyboard {
                body["reply_markup"] = json!(keyboard);
            }
            ("editMessageText", body)
        }
        Action::AnswerButton { callback_id, text } => {
            let mut body = json!({"callback_query_id": callback_id});
            if let Some(text) = text {
                body["text"] = json!(text);
            }
            ("answerCallbackQuery", body)
        }
    }
}

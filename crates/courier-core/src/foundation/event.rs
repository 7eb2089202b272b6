//! Typed events decoded from raw updates.
//!
//! The variant set is closed: every [`Update`](crate::Update) decodes to
//! exactly one [`Event`], and anything the decoder does not recognise becomes
//! [`Event::Unknown`] with the original payload attached.
//!
//! ```text
//! Event
//! ├── Message(TextMessage)    ← message / edited_message / channel_post with text
//! ├── Button(ButtonAction)    ← callback_query (inline keyboard press)
//! └── Unknown(UnknownPayload) ← everything else
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::update::UpdateId;

/// The kind of an [`Event`], without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A text message.
    Message,
    /// An inline button press.
    Button,
    /// Anything the decoder did not recognise.
    Unknown,
}

impl EventKind {
    /// Returns the kind as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Button => "button",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sender of a message or button press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Platform user id.
    pub id: i64,
    /// Whether the user is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Display name.
    #[serde(default)]
    pub first_name: String,
    /// Public username, without the leading `@`.
    #[serde(default)]
    pub username: Option<String>,
}

/// A text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    /// Id of the update that carried this message.
    pub update_id: UpdateId,
    /// Id of the message within its chat.
    pub message_id: i64,
    /// Chat the message was posted in.
    pub chat_id: i64,
    /// Sender; absent for anonymous channel posts.
    pub from: Option<User>,
    /// Message text.
    pub text: String,
    /// Unix timestamp of the message.
    pub date: i64,
}

/// A bot command parsed from the start of a message, e.g. `/start@my_bot arg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    /// Command name without the slash or bot mention.
    pub name: &'a str,
    /// Bot username after `@`, if the command names one.
    pub mention: Option<&'a str>,
    /// Remaining text after the command, trimmed.
    pub args: &'a str,
}

impl Command<'_> {
    /// Returns `true` if the command names no bot, or names `username`.
    ///
    /// Usernames compare case-insensitively; a leading `@` on `username` is
    /// ignored.
    pub fn is_addressed_to(&self, username: &str) -> bool {
        let username = username.trim_start_matches('@');
        self.mention
            .is_none_or(|mention| mention.eq_ignore_ascii_case(username))
    }
}

impl TextMessage {
    /// Parses a leading bot command, if the text starts with one.
    pub fn command(&self) -> Option<Command<'_>> {
        let rest = self.text.strip_prefix('/')?;
        let (head, args) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };
        let (name, mention) = match head.split_once('@') {
            Some((name, mention)) => (name, Some(mention)),
            None => (head, None),
        };
        if name.is_empty() {
            return None;
        }
        Some(Command {
            name,
            mention,
            args,
        })
    }

    /// Returns `true` if the message starts with a bot command.
    pub fn is_command(&self) -> bool {
        self.command().is_some()
    }
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonAction {
    /// Id of the update that carried this press.
    pub update_id: UpdateId,
    /// Id to use when answering the press.
    pub callback_id: String,
    /// Who pressed the button.
    pub from: User,
    /// Data attached to the button, if any.
    pub data: Option<String>,
    /// Chat of the message carrying the keyboard, when still accessible.
    pub chat_id: Option<i64>,
    /// Id of the message carrying the keyboard, when still accessible.
    pub message_id: Option<i64>,
}

/// A payload the decoder did not recognise, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownPayload {
    /// Id of the update.
    pub update_id: UpdateId,
    /// The untouched raw payload.
    pub raw: Value,
}

/// A decoded event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A text message.
    Message(TextMessage),
    /// An inline button press.
    Button(ButtonAction),
    /// An unrecognised payload.
    Unknown(UnknownPayload),
}

impl Event {
    /// Id of the update this event was decoded from.
    pub fn update_id(&self) -> UpdateId {
        match self {
            Self::Message(m) => m.update_id,
            Self::Button(b) => b.update_id,
            Self::Unknown(u) => u.update_id,
        }
    }

    /// The event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Button(_) => EventKind::Button,
            Self::Unknown(_) => EventKind::Unknown,
        }
    }

    /// Chat the event belongs to, when known.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Message(m) => Some(m.chat_id),
            Self::Button(b) => b.chat_id,
            Self::Unknown(_) => None,
        }
    }

    /// The sender, when known.
    pub fn sender(&self) -> Option<&User> {
        match self {
            Self::Message(m) => m.from.as_ref(),
            Self::Button(b) => Some(&b.from),
            Self::Unknown(_) => None,
        }
    }

    /// Returns the message if this is a [`Event::Message`].
    pub fn as_message(&self) -> Option<&TextMessage> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the button press if this is a [`Event::Button`].
    pub fn as_button(&self) -> Option<&ButtonAction> {
        match self {
            Self::Button(b) => Some(b),
            _ => None,
        }
    }

    /// Message text, for message events.
    pub fn text(&self) -> Option<&str> {
        self.as_message().map(|m| m.text.as_str())
    }
}

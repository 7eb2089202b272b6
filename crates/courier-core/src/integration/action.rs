//! Outbound actions a handler can ask the transport to perform.

use serde::{Deserialize, Serialize};

/// A single inline keyboard button carrying callback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    /// Label shown to the user.
    pub text: String,
    /// Data delivered back in the resulting button press.
    pub callback_data: String,
}

impl InlineButton {
    /// Creates a button.
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// An inline keyboard attached to a message.
///
/// Serializes to the Bot API `InlineKeyboardMarkup` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    /// Button rows, top to bottom.
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Creates an empty keyboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row of buttons (builder pattern).
    pub fn row(mut self, buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        self.inline_keyboard.push(buttons.into_iter().collect());
        self
    }

    /// Appends a row holding a single button (builder pattern).
    pub fn button(self, text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        self.row([InlineButton::new(text, callback_data)])
    }

    /// Returns `true` if the keyboard has no buttons.
    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.iter().all(Vec::is_empty)
    }
}

/// Where an action is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A chat, by id.
    Chat(i64),
    /// A pending button press, by callback id.
    Callback(String),
}

/// An action sent back to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Post a new text message.
    SendText {
        /// Destination chat.
        chat_id: i64,
        /// Message text.
        text: String,
        /// Optional inline keyboard.
        keyboard: Option<InlineKeyboard>,
        /// Suppress link previews.
        disable_preview: bool,
    },
    /// Replace the text (and keyboard) of an existing message.
    EditText {
        /// Chat holding the message.
        chat_id: i64,
        /// Message to edit.
        message_id: i64,
        /// New text.
        text: String,
        /// New keyboard; `None` removes it.
        keyboard: Option<InlineKeyboard>,
    },
    /// Acknowledge a button press, optionally with a toast.
    AnswerButton {
        /// The press being answered.
        callback_id: String,
        /// Optional notification text.
        text: Option<String>,
    },
}

impl Action {
    /// Creates a plain [`Action::SendText`].
    pub fn send_text(chat_id: i64, text: impl Into<String>) -> Self {
        Self::SendText {
            chat_id,
            text: text.into(),
            keyboard: None,
            disable_preview: false,
        }
    }

    /// Creates an [`Action::EditText`] without a keyboard.
    pub fn edit_text(chat_id: i64, message_id: i64, text: impl Into<String>) -> Self {
        Self::EditText {
            chat_id,
            message_id,
            text: text.into(),
            keyboard: None,
        }
    }

    /// Creates a silent [`Action::AnswerButton`].
    pub fn answer(callback_id: impl Into<String>) -> Self {
        Self::AnswerButton {
            callback_id: callback_id.into(),
            text: None,
        }
    }

    /// Attaches a keyboard. No effect on [`Action::AnswerButton`].
    pub fn with_keyboard(mut self, markup: InlineKeyboard) -> Self {
        match &mut self {
            Self::SendText { keyboard, .. } | Self::EditText { keyboard, .. } => {
                *keyboard = Some(markup);
            }
            Self::AnswerButton { .. } => {}
        }
        self
    }

    /// Disables link previews. Only meaningful for [`Action::SendText`].
    pub fn without_preview(mut self) -> Self {
        if let Self::SendText {
            disable_preview, ..
        } = &mut self
        {
            *disable_preview = true;
        }
        self
    }

    /// Where the action is delivered.
    pub fn target(&self) -> Target {
        match self {
            Self::SendText { chat_id, .. } | Self::EditText { chat_id, .. } => {
                Target::Chat(*chat_id)
            }
            Self::AnswerButton { callback_id, .. } => Target::Callback(callback_id.clone()),
        }
    }
}

/// Acknowledgement of a successfully sent action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ack {
    /// Id of the message created or edited, when the platform returns one.
    pub message_id: Option<i64>,
}

//! Route builder functions for common event shapes.
//!
//! Each function returns a named [`Route`] with its check pre-set, ready for
//! further [`check`](Route::check) calls and a [`handler`](Route::handler).
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_framework::{HandlerRegistry, on_button_data, on_command, on_text};
//!
//! let registry = HandlerRegistry::new()
//!     .with(on_command("start").handler(show_menu))
//!     .with(on_button_data("email").handler(ask_email))
//!     .with(on_text().handler(read_input));
//! ```

use courier_core::{Event, EventKind};

use crate::route::Route;

/// Creates a route for any text message, commands included.
///
/// The route is named `"message"`.
pub fn on_message() -> Route {
    Route::new()
        .name("message")
        .check(|event| event.kind() == EventKind::Message)
}

/// Creates a route for text messages that are not bot commands.
///
/// The route is named `"text"`.
pub fn on_text() -> Route {
    Route::new()
        .name("text")
        .check(|event| event.as_message().is_some_and(|msg| !msg.is_command()))
}

/// Creates a route for the bot command `/name` sent without a `@bot` suffix.
/// `name` is given without the leading slash.
///
/// Commands addressed to a bot, such as `/name@some_bot`, are left to
/// [`on_command_for`], which knows which bot it is.
///
/// The route is named `"command:<name>"`.
pub fn on_command(name: impl Into<String>) -> Route {
    let name = name.into();
    Route::new().name(format!("command:{name}")).check(move |event| {
        event
            .as_message()
            .and_then(|msg| msg.command())
            .is_some_and(|cmd| cmd.name == name && cmd.mention.is_none())
    })
}

/// Creates a route for the bot command `/name` sent bare or addressed to
/// `bot_username`. Commands addressed to any other bot do not match.
///
/// The route is named `"command:<name>"`.
pub fn on_command_for(name: impl Into<String>, bot_username: impl Into<String>) -> Route {
    let name = name.into();
    let username = bot_username.into();
    Route::new().name(format!("command:{name}")).check(move |event| {
        event
            .as_message()
            .and_then(|msg| msg.command())
            .is_some_and(|cmd| cmd.name == name && cmd.is_addressed_to(&username))
    })
}

/// Creates a route for any button press.
///
/// The route is named `"button"`.
pub fn on_button() -> Route {
    Route::new()
        .name("button")
        .check(|event| event.kind() == EventKind::Button)
}

/// Creates a route for button presses whose data equals `value`.
///
/// The route is named `"button:<value>"`.
pub fn on_button_data(value: impl Into<String>) -> Route {
    let value = value.into();
    Route::new().name(format!("button:{value}")).check(move |event| {
        event
            .as_button()
            .and_then(|button| button.data.as_deref())
            .is_some_and(|data| data == value)
    })
}

/// Creates a route for updates the decoder did not recognise.
pub fn on_unknown() -> Route {
    Route::new()
        .name("unknown")
        .check(|event| matches!(event, Event::Unknown(_)))
}

/// Creates a route matching every event. Register it last.
pub fn on_any() -> Route {
    Route::new().name("any")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{button_event, text_event};
    use courier_core::{Update, decode};
    use serde_json::json;

    async fn noop() {}

    #[test]
    fn test_text_excludes_commands() {
        let route = on_text().handler(noop);
        assert!(route.matches(&text_event(1, "alice@example.com")));
        assert!(!route.matches(&text_event(2, "/start")));
        assert!(on_message().handler(noop).matches(&text_event(2, "/start")));
    }

    #[test]
    fn test_command_matching() {
        let route = on_command("start").handler(noop);
        assert!(route.matches(&text_event(1, "/start")));
        assert!(!route.matches(&text_event(2, "/start@lookup_bot now")));
        assert!(!route.matches(&text_event(3, "/starting")));
        assert!(!route.matches(&text_event(4, "start")));
        assert_eq!(route.get_name(), Some("command:start"));
    }

    #[test]
    fn test_command_for_bot_ignores_other_bots() {
        let route = on_command_for("start", "lookup_bot").handler(noop);
        assert!(route.matches(&text_event(1, "/start")));
        assert!(route.matches(&text_event(2, "/start@Lookup_Bot now")));
        assert!(!route.matches(&text_event(3, "/start@other_bot")));
        assert!(!route.matches(&text_event(4, "/cancel@lookup_bot")));
        assert_eq!(route.get_name(), Some("command:start"));
    }

    #[test]
    fn test_button_data_matching() {
        let route = on_button_data("email").handler(noop);
        assert!(route.matches(&button_event(1, "email")));
        assert!(!route.matches(&button_event(2, "phone")));
        assert!(!route.matches(&text_event(3, "email")));
        assert!(on_button().handler(noop).matches(&button_event(4, "phone")));
    }

    #[test]
    fn test_unknown_and_any() {
        let unknown = decode(&Update::new(9, json!({"poll": {"id": "1"}})));
        assert!(on_unknown().handler(noop).matches(&unknown));
        assert!(!on_unknown().handler(noop).matches(&text_event(1, "x")));
        assert!(on_any().handler(noop).matches(&unknown));
        assert!(on_any().handler(noop).matches(&button_event(2, "x")));
    }
}

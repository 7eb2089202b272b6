//! Lookup Bot Example
//!
//! A menu-driven bot on top of the Courier long-polling engine.
//!
//! # Flow
//!
//! ```text
//! /start ──▶ menu [Email] [Phone] [Username]
//!               │ button: answer, edit menu into a prompt
//!               ▼
//!         awaiting input ──invalid──▶ hint, keep waiting
//!               │ valid             (a bad phone number ends the check)
//!               ▼
//!         normalized summary + menu again
//!
//! State is kept per user in each chat. /cancel clears it at any point, and
//! buttons only work while the menu is open.
//! ```
//!
//! # Usage
//!
//! ```bash
//! COURIER_API__TOKEN=123:abc cargo run --package lookup-bot -- --profile production
//! ```

mod input;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use courier::prelude::*;
use tracing::info;

use phonenumber::country;

use crate::input::{LookupKind, parse_region};
use crate::session::{SessionKey, Sessions, State};

#[derive(Debug, Parser)]
#[command(name = "lookup-bot", version, about = "A menu-driven lookup bot")]
struct Cli {
    /// Configuration file (defaults to ./courier.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "production"
    #[arg(short, long)]
    profile: Option<String>,

    /// Region used to read phone numbers written without a `+` prefix
    #[arg(long, default_value = "SA", value_parser = parse_region)]
    region: country::Id,

    /// The bot's username, so `/start@<username>` works in groups
    #[arg(long)]
    bot_username: Option<String>,
}

fn main_menu() -> InlineKeyboard {
    LookupKind::ALL.into_iter().fold(InlineKeyboard::new(), |kb, kind| {
        kb.button(kind.label(), kind.callback_data())
    })
}

// ============================================================================
// Handlers
// ============================================================================

struct LookupBot {
    sessions: Sessions,
    region: country::Id,
}

impl LookupBot {
    fn new(region: country::Id) -> Self {
        Self {
            sessions: Sessions::default(),
            region,
        }
    }

    async fn start(&self, ctx: EventContext) -> Result<(), TransportError> {
        if let Some(key) = SessionKey::of(ctx.event()) {
            self.sessions.set(key, State::Choosing);
        }
        ctx.responder()
            .reply_with_keyboard("Choose what to check:", main_menu())
            .await?;
        Ok(())
    }

    async fn cancel(&self, ctx: EventContext) -> Result<(), TransportError> {
        if let Some(key) = SessionKey::of(ctx.event()) {
            self.sessions.clear(key);
        }
        ctx.responder().reply_text("Cancelled.").await?;
        Ok(())
    }

    async fn choose(&self, ctx: EventContext) -> Result<(), TransportError> {
        let kind = ctx
            .event()
            .as_button()
            .and_then(|button| button.data.as_deref())
            .and_then(LookupKind::from_callback_data);

        let Some(kind) = kind else {
            ctx.responder()
                .answer(Some("Unknown option".to_string()))
                .await?;
            return Ok(());
        };

        ctx.responder().answer(None).await?;
        ctx.responder().edit_text(kind.prompt()).await?;
        if let Some(key) = SessionKey::of(ctx.event()) {
            self.sessions.set(key, State::Awaiting(kind));
        }
        Ok(())
    }

    async fn input(&self, ctx: EventContext) -> Result<(), TransportError> {
        let (Some(key), Some(text)) = (SessionKey::of(ctx.event()), ctx.event().text()) else {
            return Ok(());
        };
        let Some(kind) = self.sessions.awaiting(key) else {
            return Ok(());
        };

        let report = match kind.check(text, self.region) {
            Some(value) => {
                info!(chat_id = key.chat_id, kind = ?kind, "Lookup input accepted");
                format!("{} accepted:\n{value}", kind.label())
            }
            // An unusable phone number ends the check; other kinds ask again.
            None if kind == LookupKind::Phone => kind.invalid_hint().to_string(),
            None => {
                ctx.responder().reply_text(kind.invalid_hint()).await?;
                return Ok(());
            }
        };

        ctx.responder()
            .send(Action::send_text(key.chat_id, report).without_preview())
            .await?;

        self.sessions.set(key, State::Choosing);
        ctx.responder()
            .reply_with_keyboard("Done. Choose another check:", main_menu())
            .await?;
        Ok(())
    }
}

async fn fallback(ctx: EventContext) -> Result<(), TransportError> {
    ctx.responder()
        .reply_text("Send /start to open the menu.")
        .await?;
    Ok(())
}

/// A command route that also accepts `/name@<bot_username>` when the
/// username is known.
fn command(name: &str, bot_username: Option<&str>) -> Route {
    match bot_username {
        Some(username) => on_command_for(name, username),
        None => on_command(name),
    }
}

/// Builds the routes in match order.
fn routes(bot: Arc<LookupBot>, bot_username: Option<&str>) -> Vec<Route> {
    let (start, cancel, choose, input) = (
        Arc::clone(&bot),
        Arc::clone(&bot),
        Arc::clone(&bot),
        Arc::clone(&bot),
    );
    let (menu_state, input_state) = (Arc::clone(&bot), bot);

    vec![
        command("start", bot_username).handler(move |ctx: EventContext| {
            let bot = Arc::clone(&start);
            async move { bot.start(ctx).await }
        }),
        command("cancel", bot_username).handler(move |ctx: EventContext| {
            let bot = Arc::clone(&cancel);
            async move { bot.cancel(ctx).await }
        }),
        on_button()
            .name("menu")
            .check(move |event| {
                SessionKey::of(event).is_some_and(|key| menu_state.sessions.is_choosing(key))
            })
            .handler(move |ctx: EventContext| {
                let bot = Arc::clone(&choose);
                async move { bot.choose(ctx).await }
            }),
        on_text()
            .name("input")
            .check(move |event| {
                SessionKey::of(event)
                    .is_some_and(|key| input_state.sessions.awaiting(key).is_some())
            })
            .handler(move |ctx: EventContext| {
                let bot = Arc::clone(&input);
                async move { bot.input(ctx).await }
            }),
        on_text().name("fallback").handler(fallback),
    ]
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut builder = CourierRuntime::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &cli.profile {
        builder = builder.profile(profile);
    }
    let mut runtime = builder.build()?;

    let bot = Arc::new(LookupBot::new(cli.region));
    for route in routes(bot, cli.bot_username.as_deref()) {
        runtime.add(route);
    }
    info!(routes = runtime.registry().len(), "Lookup bot ready");

    runtime.run().await?;

    Ok(())
}

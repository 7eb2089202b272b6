//! # Courier
//!
//! A long-polling update engine for Bot API style chat platforms.
//!
//! ## Overview
//!
//! Courier repeatedly asks the platform for updates past a cursor, decodes
//! each one into a typed event, routes it to the first matching handler and
//! only then moves the cursor forward. Transient failures back off
//! exponentially; rejected credentials stop the engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  fetch(cursor)  ┌──────────┐  decode  ┌────────────┐  resolve  ┌─────────┐
//! │ Transport │◀────────────────│ PollLoop │─────────▶│ Dispatcher │──────────▶│ Handler │
//! │ (Bot API) │────updates─────▶│ + cursor │◀─results─│            │◀──────────│         │
//! └───────────┘                 └──────────┘          └────────────┘           └─────────┘
//!       ▲                                                                        │
//!       └────────────────────────── Responder (send / edit / answer) ─────────────┘
//! ```
//!
//! - **Transport**: `getUpdates` long polling and outbound actions
//! - **PollLoop**: phase machine owning the cursor, backoff and checkpoint
//! - **Dispatcher**: first-match routing with per-handler timeout and panic
//!   isolation
//! - **Handlers**: user async functions receiving an `EventContext`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! async fn start(ctx: EventContext) -> Result<(), TransportError> {
//!     ctx.responder().reply_text("Hello!").await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::builder()
//!         .build()?
//!         .with(on_command("start").handler(start));
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `courier.toml` files (default)
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;
pub use courier_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{CourierHandle, CourierRuntime, Diagnostic, PollPhase};

    // Events
    pub use courier_core::{
        ButtonAction, Command, Event, EventKind, TextMessage, UnknownPayload, UpdateId, User,
    };

    // Outbound actions
    pub use courier_core::{Ack, Action, InlineButton, InlineKeyboard, TransportError};

    // Handlers and routing
    pub use courier_framework::{
        EventContext, HandlerFault, HandlerRegistry, Responder, Route, on_any, on_button,
        on_button_data, on_command, on_command_for, on_message, on_text, on_unknown,
    };
}

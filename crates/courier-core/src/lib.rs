//! # Courier Core
//!
//! The data model and platform seam of the Courier update engine.
//!
//! This crate holds everything that does not need an async runtime: raw
//! updates, typed events, the decoder, the polling cursor, outbound actions
//! and the [`Transport`] trait that the poll loop drives.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Updates**: Raw platform payloads with a monotonically increasing id ([`Update`])
//! - **Events**: Typed views of updates ([`Event`], [`TextMessage`], [`ButtonAction`])
//! - **Decoder**: Total conversion from update to event ([`decode`])
//! - **Cursor**: Single-writer offset ownership ([`OffsetTracker`])
//!
//! ### Integration Layer
//!
//! - **Actions**: Outbound requests ([`Action`], [`InlineKeyboard`])
//! - **Transport**: Fetching updates and sending actions ([`Transport`])
//!
//! ## Update Flow
//!
//! ```text
//! ┌───────────┐  Update  ┌─────────┐  Event  ┌────────────┐
//! │ Transport │─────────▶│ decode  │────────▶│ Dispatcher │
//! └───────────┘          └─────────┘         └────────────┘
//!       ▲                                          │
//!       └──────────────── Action ──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use courier_core::{Event, OffsetTracker, Update, decode};
//! use serde_json::json;
//!
//! let update = Update::new(
//!     6,
//!     json!({"message": {"message_id": 1, "chat": {"id": 10}, "text": "/start"}}),
//! );
//!
//! let mut cursor = OffsetTracker::new(5);
//! let event = decode(&update);
//! assert!(matches!(event, Event::Message(_)));
//!
//! cursor.advance(update.id());
//! assert_eq!(cursor.current(), 7);
//! ```

pub mod error;
pub mod foundation;
pub mod integration;

pub use error::{TransportError, TransportResult};

pub use foundation::{
    ButtonAction, Command, CursorReader, Event, EventKind, OffsetTracker, TextMessage,
    UnknownPayload, Update, UpdateId, User, decode,
};

pub use integration::{
    Ack, Action, BoxedTransport, InlineButton, InlineKeyboard, Target, Transport,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{TransportError, TransportResult};
    pub use super::foundation::*;
    pub use super::integration::*;
}

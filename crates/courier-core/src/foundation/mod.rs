//! Foundation layer - data model of the engine.
//!
//! - Raw updates as fetched from the transport
//! - Typed events and the total decoder
//! - The single-writer polling cursor

pub mod decode;
pub mod event;
pub mod offset;
pub mod update;

pub use decode::decode;
pub use event::{ButtonAction, Command, Event, EventKind, TextMessage, UnknownPayload, User};
pub use offset::{CursorReader, OffsetTracker};
pub use update::{Update, UpdateId};

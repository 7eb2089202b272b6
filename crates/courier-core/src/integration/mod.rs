//! Integration layer - the seam between the engine and the platform.
//!
//! - Outbound [`Action`]s and their acknowledgements
//! - The [`Transport`] capability

pub mod action;
pub mod transport;

pub use action::{Ack, Action, InlineButton, InlineKeyboard, Target};
pub use transport::{BoxedTransport, Transport};

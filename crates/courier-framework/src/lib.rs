//! # Courier Framework
//!
//! Routing and handler execution for the Courier update engine.
//!
//! This layer provides:
//! - [`Route`]s pairing a predicate with one handler and an optional timeout
//! - An ordered [`HandlerRegistry`] where the first matching route wins
//! - Route builders for common event shapes ([`on_command`], [`on_button_data`], ...)
//! - A [`Dispatcher`] that contains handler errors, panics and timeouts
//! - [`EventContext`] and [`Responder`] for replying from handlers

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod predicates;
pub mod route;

#[cfg(test)]
mod testing;

pub use context::{EventContext, Responder};
pub use dispatcher::{DEFAULT_HANDLER_TIMEOUT, DispatchMode, DispatchResult, Dispatcher};
pub use error::{HandlerFault, HandlerResult};
pub use handler::{BoxedHandler, Handler, HandlerResponse, into_handler};
pub use predicates::{
    on_any, on_button, on_button_data, on_command, on_command_for, on_message, on_text, on_unknown,
};
pub use route::{CheckFn, HandlerRegistry, Route};

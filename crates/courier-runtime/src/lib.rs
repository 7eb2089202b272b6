//! Courier Runtime - Poll loop and lifecycle for the Courier engine.
//!
//! This crate provides:
//! - The poll loop state machine (`PollLoop`, `PollPhase`, `Diagnostic`)
//! - Runtime orchestration (`CourierRuntime`, `CourierHandle`)
//! - Backoff policy for failed fetches
//! - Cursor checkpointing (`CheckpointStore`, `FileCheckpoint`)
//! - Layered configuration and logging setup
//!
//! # Example
//!
//! ```ignore
//! use courier_framework::on_command;
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Reads courier.toml and COURIER_* variables, sets up logging
//!     let runtime = CourierRuntime::builder()
//!         .build()?
//!         .with(on_command("start").handler(|ctx: EventContext| async move {
//!             ctx.responder().reply_text("Hello!").await.map(|_| ())
//!         }));
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Cargo Features
//!
//! - `toml-config` (default): load `courier.toml` files
//! - `json-log`: JSON log output

pub mod backoff;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod logging;
pub mod poll;
pub mod runtime;

// Re-exports
pub use backoff::BackoffPolicy;
pub use checkpoint::{CheckpointError, CheckpointStore, FileCheckpoint};
pub use config::{ConfigError, ConfigLoader, ConfigResult, CourierConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use poll::{Diagnostic, PollLoop, PollPhase, PollSettings};
pub use runtime::{CourierHandle, CourierRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}

//! Runtime error types.

use thiserror::Error;

use courier_core::TransportError;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The platform rejected the credentials; polling stopped.
    #[error("Unauthorized: {0}")]
    Unauthorized(TransportError),

    /// The HTTP client could not be constructed.
    #[error("Transport setup failed: {0}")]
    Transport(TransportError),

    /// `start` was called on a runtime that is already running.
    #[error("Runtime is already running")]
    AlreadyRunning,

    /// The poll task panicked or was aborted.
    #[error("Poll task failed: {0}")]
    Task(String),

    /// The initial cursor could not be read from the checkpoint store.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

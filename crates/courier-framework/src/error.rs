//! Error types for the Courier framework.

use std::time::Duration;

use thiserror::Error;

/// Why a handler invocation did not complete successfully.
///
/// Faults are always recoverable: the dispatcher records them in the
/// [`DispatchResult`](crate::DispatchResult) and the poll loop moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerFault {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The handler exceeded its time limit.
    #[error("handler timed out after {0:?}")]
    TimedOut(Duration),
}

impl HandlerFault {
    /// Creates a [`HandlerFault::Failed`].
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Short, stable name of the variant (for structured logs).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
            Self::TimedOut(_) => "timed_out",
        }
    }
}

/// Result type returned by type-erased handlers.
pub type HandlerResult = Result<(), HandlerFault>;

//! Handler system for the Courier framework.
//!
//! Handlers are plain async functions or closures. The [`Handler`] trait is
//! implemented for them through blanket implementations, so both of these can
//! be registered directly:
//!
//! ```rust,ignore
//! use courier_framework::EventContext;
//!
//! // Needs the event and a way to reply
//! async fn greet(ctx: EventContext) -> anyhow::Result<()> {
//!     ctx.responder().reply_text("hello").await?;
//!     Ok(())
//! }
//!
//! // Only observes that something happened
//! async fn tick() {
//!     tracing::info!("event");
//! }
//! ```
//!
//! Return values are reduced to success or a [`HandlerFault::Failed`]; they are
//! never consumed otherwise.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::EventContext;
use crate::error::{HandlerFault, HandlerResult};

// ============================================================================
// HandlerResponse - Reduce handler return values to an outcome
// ============================================================================

/// A trait for types a handler may return.
pub trait HandlerResponse: Send {
    /// Converts the value into the handler outcome.
    fn into_result(self) -> HandlerResult;
}

impl HandlerResponse for () {
    fn into_result(self) -> HandlerResult {
        Ok(())
    }
}

/// On `Err`, the error's display form becomes the fault message.
impl<T, E> HandlerResponse for Result<T, E>
where
    T: HandlerResponse,
    E: Display + Send,
{
    fn into_result(self) -> HandlerResult {
        match self {
            Ok(t) => t.into_result(),
            Err(e) => Err(HandlerFault::Failed(e.to_string())),
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for event handlers.
///
/// `T` is a marker for the argument shape and lets closures with and without
/// an [`EventContext`] parameter both implement the trait.
#[async_trait]
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// Calls the handler with the given context.
    async fn call(self, ctx: EventContext) -> HandlerResult;
}

#[async_trait]
impl<F, Fut, Res> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: HandlerResponse + 'static,
{
    async fn call(self, _ctx: EventContext) -> HandlerResult {
        (self)().await.into_result()
    }
}

#[async_trait]
impl<F, Fut, Res> Handler<(EventContext,)> for F
where
    F: FnOnce(EventContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: HandlerResponse + 'static,
{
    async fn call(self, ctx: EventContext) -> HandlerResult {
        (self)(ctx).await.into_result()
    }
}

// ============================================================================
// BoxedHandler - Type-erased handler stored in routes
// ============================================================================

/// A type-erased handler.
///
/// Internally a closure that captures the original handler and calls a
/// cloned copy on each invocation.
pub type BoxedHandler = Arc<dyn Fn(EventContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Converts a handler into a [`BoxedHandler`].
pub fn into_handler<F, T>(f: F) -> BoxedHandler
where
    F: Handler<T>,
    T: 'static,
{
    Arc::new(move |ctx| f.clone().call(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, text_event};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> EventContext {
        EventContext::new(Arc::new(text_event(1, "hi")), RecordingTransport::new())
    }

    #[tokio::test]
    async fn test_unit_handler_succeeds() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let handler = into_handler(move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert_eq!(handler(ctx()).await, Ok(()));
        assert_eq!(handler(ctx()).await, Ok(()));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_becomes_failed_fault() {
        let handler = into_handler(|ctx: EventContext| async move {
            if ctx.event().text() == Some("hi") {
                Err("boom")
            } else {
                Ok(())
            }
        });

        assert_eq!(handler(ctx()).await, Err(HandlerFault::failed("boom")));
    }
}

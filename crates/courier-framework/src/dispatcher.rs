//! Event dispatcher for the Courier framework.
//!
//! The [`Dispatcher`] resolves each [`Event`] to exactly one [`Route`] and runs
//! its handler under a time limit. Handler failures never escape: an error, a
//! panic or a timeout is turned into [`DispatchResult::Failed`] so the caller
//! can always move on to the next event.
//!
//! ```rust,ignore
//! use courier_framework::{Dispatcher, DispatchMode, HandlerRegistry, on_command};
//!
//! let registry = HandlerRegistry::new().with(on_command("start").handler(start));
//! let dispatcher = Dispatcher::new(registry, transport);
//!
//! let results = dispatcher.dispatch_batch(events, DispatchMode::Sequential).await;
//! ```
//!
//! # Tower Service Integration
//!
//! `Dispatcher` implements `tower::Service<Event>`, so middleware can be
//! layered over the whole dispatch step.

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{FutureExt, StreamExt, stream};
use tower::Service;
use tracing::{Instrument, Level, debug, span, warn};

use courier_core::{BoxedTransport, Event, UpdateId};

use crate::context::EventContext;
use crate::error::HandlerFault;
use crate::route::HandlerRegistry;

/// Handler time limit used when neither the route nor the caller sets one.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// How a batch of events is dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// One event at a time, in input order.
    #[default]
    Sequential,
    /// Up to `max_in_flight` events at a time.
    ///
    /// Results are still returned in input order, and only once every
    /// dispatch has finished.
    Concurrent {
        /// Upper bound on concurrently running handlers.
        max_in_flight: usize,
    },
}

impl DispatchMode {
    /// `Sequential` for a limit of 0 or 1, `Concurrent` otherwise.
    pub fn from_max_in_flight(max_in_flight: usize) -> Self {
        if max_in_flight <= 1 {
            Self::Sequential
        } else {
            Self::Concurrent { max_in_flight }
        }
    }
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// A handler ran to completion.
    Handled {
        /// Id of the dispatched update.
        update_id: UpdateId,
        /// Name of the route that handled it.
        route: String,
    },
    /// No route matched. Not an error.
    Unmatched {
        /// Id of the dispatched update.
        update_id: UpdateId,
    },
    /// The handler failed, panicked or timed out.
    Failed {
        /// Id of the dispatched update.
        update_id: UpdateId,
        /// Name of the route whose handler failed.
        route: String,
        /// What went wrong.
        fault: HandlerFault,
    },
}

impl DispatchResult {
    /// Returns the id of the dispatched update.
    pub fn update_id(&self) -> UpdateId {
        match self {
            Self::Handled { update_id, .. }
            | Self::Unmatched { update_id }
            | Self::Failed { update_id, .. } => *update_id,
        }
    }

    /// Returns `true` for [`DispatchResult::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns the fault, if the dispatch failed.
    pub fn fault(&self) -> Option<&HandlerFault> {
        match self {
            Self::Failed { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

/// Routes events to handlers.
///
/// Cheap to clone; the registry and transport are shared.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    transport: BoxedTransport,
    default_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher whose handlers reply through `transport`.
    pub fn new(registry: HandlerRegistry, transport: BoxedTransport) -> Self {
        Self {
            registry: Arc::new(registry),
            transport,
            default_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    /// Sets the time limit for routes that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Returns the registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns the time limit for routes that do not set their own.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Dispatches one event to the first matching route.
    ///
    /// Never fails: every outcome is reported through [`DispatchResult`].
    pub async fn dispatch(&self, event: Event) -> DispatchResult {
        let update_id = event.update_id();
        let span = span!(Level::DEBUG, "dispatch", update_id, kind = %event.kind());

        async move {
            let Some(route) = self.registry.resolve(&event) else {
                match &event {
                    Event::Unknown(unknown) => {
                        debug!(raw = %unknown.raw, "No route matched unknown update, skipping");
                    }
                    _ => debug!("No route matched, skipping"),
                }
                return DispatchResult::Unmatched { update_id };
            };
            let Some(handler) = route.get_handler() else {
                return DispatchResult::Unmatched { update_id };
            };

            let route_name = route.display_name().to_string();
            let limit = route.get_timeout().unwrap_or(self.default_timeout);
            let ctx = EventContext::new(Arc::new(event), Arc::clone(&self.transport));

            debug!(route = %route_name, "Running handler");
            let guarded = AssertUnwindSafe(handler(ctx)).catch_unwind();
            let outcome = match tokio::time::timeout(limit, guarded).await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(HandlerFault::Panicked(panic_message(payload.as_ref()))),
                Err(_) => Err(HandlerFault::TimedOut(limit)),
            };

            match outcome {
                Ok(()) => DispatchResult::Handled {
                    update_id,
                    route: route_name,
                },
                Err(fault) => {
                    warn!(route = %route_name, error = %fault, "Handler fault");
                    DispatchResult::Failed {
                        update_id,
                        route: route_name,
                        fault,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Dispatches a batch and returns one result per event, in input order.
    ///
    /// Returns only after every dispatch has finished.
    pub async fn dispatch_batch(&self, events: Vec<Event>, mode: DispatchMode) -> Vec<DispatchResult> {
        match mode {
            DispatchMode::Sequential => {
                let mut results = Vec::with_capacity(events.len());
                for event in events {
                    results.push(self.dispatch(event).await);
                }
                results
            }
            DispatchMode::Concurrent { max_in_flight } => {
                stream::iter(events)
                    .map(|event| self.dispatch(event))
                    .buffered(max_in_flight.max(1))
                    .collect()
                    .await
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("route_count", &self.registry.len())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tower Service Implementation for Dispatcher
// ============================================================================

impl Service<Event> for Dispatcher {
    type Response = DispatchResult;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: Event) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(event).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::{on_any, on_button, on_text};
    use crate::route::Route;
    use crate::testing::{RecordingTransport, button_event, text_event};
    use courier_core::Action;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogCapture {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    impl LogCapture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.bytes.lock()).to_string()
        }
    }

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn dispatcher(registry: HandlerRegistry) -> Dispatcher {
        Dispatcher::new(registry, RecordingTransport::new())
    }

    #[tokio::test]
    async fn test_dispatch_no_routes() {
        let result = dispatcher(HandlerRegistry::new())
            .dispatch(text_event(1, "x"))
            .await;
        assert_eq!(result, DispatchResult::Unmatched { update_id: 1 });
    }

    #[tokio::test]
    async fn test_unmatched_unknown_logs_raw_payload() {
        let logs = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let unknown = courier_core::decode(&courier_core::Update::new(
            8,
            serde_json::json!({"update_id": 8, "poll": {"id": "p-17"}}),
        ));
        let result = dispatcher(HandlerRegistry::new().with(on_text().handler(|| async {})))
            .dispatch(unknown)
            .await;

        assert_eq!(result, DispatchResult::Unmatched { update_id: 8 });
        let output = logs.text();
        assert!(output.contains("No route matched unknown update"), "{output}");
        assert!(output.contains("p-17"), "{output}");
    }

    #[tokio::test]
    async fn test_exactly_one_handler_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c1 = Arc::clone(&counter);
        let c2 = Arc::clone(&counter);

        let registry = HandlerRegistry::new()
            .with(on_text().handler(move || {
                let c = Arc::clone(&c1);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .with(on_any().handler(move || {
                let c = Arc::clone(&c2);
                async move {
                    c.fetch_add(10, Ordering::SeqCst);
                }
            }));

        let result = dispatcher(registry).dispatch(text_event(3, "hello")).await;

        assert_eq!(
            result,
            DispatchResult::Handled {
                update_id: 3,
                route: "text".into()
            }
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_can_reply() {
        let transport = RecordingTransport::new();
        let registry = HandlerRegistry::new().with(on_text().handler(|ctx: EventContext| async move {
            ctx.responder().reply_text("pong").await.map(|_| ())
        }));

        Dispatcher::new(registry, transport.clone())
            .dispatch(text_event(1, "ping"))
            .await;

        assert_eq!(transport.sent(), vec![Action::send_text(100, "pong")]);
    }

    #[tokio::test]
    async fn test_error_yields_failed() {
        let registry = HandlerRegistry::new().with(
            Route::new()
                .name("broken")
                .handler(|| async { Err::<(), _>("database unavailable") }),
        );

        let result = dispatcher(registry).dispatch(text_event(4, "x")).await;

        assert_eq!(
            result,
            DispatchResult::Failed {
                update_id: 4,
                route: "broken".into(),
                fault: HandlerFault::failed("database unavailable"),
            }
        );
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let registry = HandlerRegistry::new().with(on_any().handler(|ctx: EventContext| async move {
            if ctx.update_id() == 5 {
                panic!("handler exploded");
            }
        }));

        let result = dispatcher(registry).dispatch(text_event(5, "x")).await;

        assert_eq!(
            result.fault(),
            Some(&HandlerFault::Panicked("handler exploded".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_uses_route_then_default() {
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        };
        let registry = HandlerRegistry::new()
            .with(on_button().timeout(Duration::from_secs(2)).handler(slow))
            .with(on_any().handler(slow));
        let dispatcher = dispatcher(registry).with_default_timeout(Duration::from_secs(5));

        let button = dispatcher.dispatch(button_event(1, "x")).await;
        assert_eq!(
            button.fault(),
            Some(&HandlerFault::TimedOut(Duration::from_secs(2)))
        );

        let text = dispatcher.dispatch(text_event(2, "x")).await;
        assert_eq!(
            text.fault(),
            Some(&HandlerFault::TimedOut(Duration::from_secs(5)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_batch_keeps_input_order() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let f = Arc::clone(&finished);
        let registry = HandlerRegistry::new().with(on_any().handler(move |ctx: EventContext| {
            let f = Arc::clone(&f);
            async move {
                // Earlier ids sleep longer, so they finish last.
                let id = ctx.update_id();
                tokio::time::sleep(Duration::from_millis(100 * (10 - id) as u64)).await;
                f.lock().push(id);
            }
        }));

        let events = (1..=4).map(|id| text_event(id, "x")).collect();
        let results = dispatcher(registry)
            .dispatch_batch(events, DispatchMode::Concurrent { max_in_flight: 4 })
            .await;

        let ids: Vec<_> = results.iter().map(DispatchResult::update_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(*finished.lock(), vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_sequential_batch_runs_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let registry = HandlerRegistry::new().with(on_any().handler(move |ctx: EventContext| {
            let s = Arc::clone(&s);
            async move {
                s.lock().push(ctx.update_id());
            }
        }));

        let events = vec![text_event(5, "a"), button_event(6, "b")];
        let results = dispatcher(registry)
            .dispatch_batch(events, DispatchMode::default())
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_failed()));
        assert_eq!(*seen.lock(), vec![5, 6]);
    }

    #[test]
    fn test_mode_from_limit() {
        assert_eq!(DispatchMode::from_max_in_flight(0), DispatchMode::Sequential);
        assert_eq!(DispatchMode::from_max_in_flight(1), DispatchMode::Sequential);
        assert_eq!(
            DispatchMode::from_max_in_flight(8),
            DispatchMode::Concurrent { max_in_flight: 8 }
        );
    }

    #[tokio::test]
    async fn test_dispatcher_as_service() {
        let registry = HandlerRegistry::new().with(on_any().handler(|| async {}));
        let result = dispatcher(registry).oneshot(text_event(9, "x")).await;

        tokio_test::assert_ok!(&result);
        assert_eq!(result.map(|r| r.update_id()), Ok(9));
    }
}

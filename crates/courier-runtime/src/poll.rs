//! The poll loop.
//!
//! A single task that owns the cursor and cycles through explicit phases:
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            ▼                              │
//! Idle ──▶ Polling ──ok──▶ Processing ──────┘
//!            │  ▲
//!   retryable│  │ delay elapsed
//!            ▼  │
//!          Backoff
//!
//! Polling ──Unauthorized──▶ Stopped ◀── cancellation (any phase)
//! ```
//!
//! At most one fetch is outstanding. A batch is fully dispatched before the
//! cursor moves past it, so an update is never skipped; a crash between
//! dispatch and checkpoint can only cause redelivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use courier_core::{
    BoxedTransport, CursorReader, Event, OffsetTracker, TransportError, Update, UpdateId, decode,
};
use courier_framework::{DispatchMode, DispatchResult, Dispatcher, HandlerFault};

use crate::backoff::BackoffPolicy;
use crate::checkpoint::CheckpointStore;

/// Capacity of the diagnostics channel. Slow subscribers lose the oldest
/// entries.
const DIAGNOSTICS_CAPACITY: usize = 256;

// =============================================================================
// Phase & Diagnostics
// =============================================================================

/// Where the poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Created, not started.
    Idle,
    /// Waiting on a fetch.
    Polling,
    /// Dispatching a fetched batch.
    Processing,
    /// Sleeping after a failed fetch.
    Backoff,
    /// Terminal.
    Stopped,
}

impl PollPhase {
    /// Returns the phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Processing => "processing",
            Self::Backoff => "backoff",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for PollPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events published for observers of the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A handler failed, panicked or timed out. The cursor still advances.
    HandlerFailed {
        update_id: UpdateId,
        route: String,
        fault: HandlerFault,
    },
    /// A fetch failed and the loop is backing off.
    TransportFailed {
        error: TransportError,
        consecutive_failures: u32,
        retry_in: Duration,
    },
    /// A non-empty batch was dispatched and the cursor advanced.
    BatchProcessed {
        count: usize,
        failed: usize,
        cursor: UpdateId,
    },
}

// =============================================================================
// Settings
// =============================================================================

/// Tuning for [`PollLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    /// Long-poll timeout passed to every fetch.
    pub timeout: Duration,
    /// How each batch is dispatched.
    pub dispatch_mode: DispatchMode,
    /// Delay policy after failed fetches.
    pub backoff: BackoffPolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            dispatch_mode: DispatchMode::Sequential,
            backoff: BackoffPolicy::default(),
        }
    }
}

// =============================================================================
// PollLoop
// =============================================================================

/// The fetch, dispatch and advance cycle.
pub struct PollLoop {
    transport: BoxedTransport,
    dispatcher: Dispatcher,
    tracker: OffsetTracker,
    settings: PollSettings,
    checkpoint: Option<Arc<dyn CheckpointStore>>,
    phase: watch::Sender<PollPhase>,
    diagnostics: broadcast::Sender<Diagnostic>,
    failures: u32,
}

impl PollLoop {
    /// Creates a loop starting at the tracker's cursor.
    pub fn new(
        transport: BoxedTransport,
        dispatcher: Dispatcher,
        tracker: OffsetTracker,
        settings: PollSettings,
    ) -> Self {
        let (phase, _) = watch::channel(PollPhase::Idle);
        let (diagnostics, _) = broadcast::channel(DIAGNOSTICS_CAPACITY);
        Self {
            transport,
            dispatcher,
            tracker,
            settings,
            checkpoint: None,
            phase,
            diagnostics,
            failures: 0,
        }
    }

    /// Saves the cursor to `store` after each advancing batch and on stop.
    pub fn with_checkpoint(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint = Some(store);
        self
    }

    /// Returns a receiver that tracks the current phase.
    pub fn phase(&self) -> watch::Receiver<PollPhase> {
        self.phase.subscribe()
    }

    /// Returns a sender handle for subscribing to diagnostics.
    pub fn diagnostics(&self) -> broadcast::Sender<Diagnostic> {
        self.diagnostics.clone()
    }

    /// Returns a read-only view of the cursor.
    pub fn cursor(&self) -> CursorReader {
        self.tracker.reader()
    }

    /// Runs until `cancel` fires or the transport reports `Unauthorized`.
    ///
    /// Returns `Ok(())` after cancellation and `Err` with the fatal error
    /// otherwise. Handlers already running when cancellation fires are not
    /// interrupted; the batch is finished and the cursor advanced first.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), TransportError> {
        info!(cursor = self.tracker.current(), "Poll loop started");

        let outcome = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }

            self.set_phase(PollPhase::Polling);
            let cursor = self.tracker.current();
            trace!(cursor, "Fetching updates");

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                result = self.transport.fetch(cursor, self.settings.timeout) => result,
            };

            match fetched {
                Ok(updates) => {
                    self.failures = 0;
                    self.set_phase(PollPhase::Processing);
                    self.process(updates).await;
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Transport rejected credentials, stopping");
                    break Err(e);
                }
                Err(e) => {
                    self.failures = self.failures.saturating_add(1);
                    let delay = self.settings.backoff.delay_for(&e, self.failures);
                    warn!(
                        error = %e,
                        failures = self.failures,
                        delay_ms = delay.as_millis() as u64,
                        "Fetch failed, backing off"
                    );
                    self.publish(Diagnostic::TransportFailed {
                        error: e,
                        consecutive_failures: self.failures,
                        retry_in: delay,
                    });

                    self.set_phase(PollPhase::Backoff);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        self.save_checkpoint().await;
        self.set_phase(PollPhase::Stopped);
        info!(cursor = self.tracker.current(), "Poll loop stopped");
        outcome
    }

    /// Dispatches a batch and advances the cursor past it.
    async fn process(&mut self, mut updates: Vec<Update>) {
        let cursor = self.tracker.current();
        updates.sort_by_key(Update::id);

        let before = updates.len();
        updates.retain(|u| u.id() >= cursor);
        if updates.len() < before {
            warn!(
                cursor,
                dropped = before - updates.len(),
                "Transport returned updates below the cursor"
            );
        }

        let Some(highest) = updates.last().map(Update::id) else {
            trace!(cursor, "Empty batch");
            return;
        };

        let count = updates.len();
        let events: Vec<Event> = updates.iter().map(decode).collect();
        let results = self
            .dispatcher
            .dispatch_batch(events, self.settings.dispatch_mode)
            .await;

        let mut failed = 0;
        for result in results {
            if let DispatchResult::Failed {
                update_id,
                route,
                fault,
            } = result
            {
                failed += 1;
                self.publish(Diagnostic::HandlerFailed {
                    update_id,
                    route,
                    fault,
                });
            }
        }

        if self.tracker.advance(highest) {
            self.save_checkpoint().await;
        }
        let cursor = self.tracker.current();
        debug!(count, failed, cursor, "Batch processed");
        self.publish(Diagnostic::BatchProcessed {
            count,
            failed,
            cursor,
        });
    }

    async fn save_checkpoint(&self) {
        if let Some(store) = &self.checkpoint {
            let cursor = self.tracker.current();
            if let Err(e) = store.save(cursor).await {
                warn!(cursor, error = %e, "Failed to save checkpoint");
            }
        }
    }

    fn set_phase(&self, phase: PollPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            trace!(from = %previous, to = %phase, "Phase changed");
        }
    }

    fn publish(&self, diagnostic: Diagnostic) {
        // No subscribers is fine.
        let _ = self.diagnostics.send(diagnostic);
    }
}

impl std::fmt::Debug for PollLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollLoop")
            .field("cursor", &self.tracker.current())
            .field("phase", &*self.phase.borrow())
            .field("settings", &self.settings)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::checkpoint::CheckpointError;
    use async_trait::async_trait;
    use courier_core::{Ack, Action, Transport, TransportResult};
    use courier_framework::{EventContext, HandlerRegistry, on_any, on_button, on_text};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Plays back scripted fetch results, then cancels `done` and waits.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<TransportResult<Vec<Update>>>>,
        fetches: Mutex<Vec<(UpdateId, Instant)>>,
        sent: Mutex<Vec<Action>>,
        done: CancellationToken,
    }

    impl ScriptedTransport {
        pub(crate) fn new(
            script: Vec<TransportResult<Vec<Update>>>,
            done: CancellationToken,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fetches: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                done,
            })
        }

        pub(crate) fn cursors(&self) -> Vec<UpdateId> {
            self.fetches.lock().iter().map(|(c, _)| *c).collect()
        }

        pub(crate) fn fetch_times(&self) -> Vec<Instant> {
            self.fetches.lock().iter().map(|(_, t)| *t).collect()
        }

        pub(crate) fn sent(&self) -> Vec<Action> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(&self, cursor: UpdateId, _timeout: Duration) -> TransportResult<Vec<Update>> {
            self.fetches.lock().push((cursor, Instant::now()));
            let next = self.script.lock().pop_front();
            match next {
                Some(result) => result,
                None => {
                    self.done.cancel();
                    std::future::pending().await
                }
            }
        }

        async fn send(&self, action: Action) -> TransportResult<Ack> {
            self.sent.lock().push(action);
            Ok(Ack::default())
        }
    }

    #[derive(Default)]
    struct MemoryCheckpoint {
        saved: Mutex<Vec<UpdateId>>,
    }

    #[async_trait]
    impl CheckpointStore for MemoryCheckpoint {
        async fn load(&self) -> Result<Option<UpdateId>, CheckpointError> {
            Ok(self.saved.lock().last().copied())
        }

        async fn save(&self, cursor: UpdateId) -> Result<(), CheckpointError> {
            self.saved.lock().push(cursor);
            Ok(())
        }
    }

    pub(crate) fn text_update(id: UpdateId, text: &str) -> Update {
        Update::new(
            id,
            json!({"update_id": id, "message": {"message_id": id, "chat": {"id": 1}, "text": text}}),
        )
    }

    pub(crate) fn button_update(id: UpdateId, data: &str) -> Update {
        Update::new(
            id,
            json!({
                "update_id": id,
                "callback_query": {
                    "id": format!("cb-{id}"),
                    "from": {"id": 1, "first_name": "Ann"},
                    "data": data,
                    "message": {"message_id": 3, "chat": {"id": 1}}
                }
            }),
        )
    }

    fn no_jitter() -> PollSettings {
        PollSettings {
            backoff: BackoffPolicy {
                jitter: 0.0,
                ..BackoffPolicy::default()
            },
            ..PollSettings::default()
        }
    }

    fn poll_loop(
        transport: Arc<ScriptedTransport>,
        registry: HandlerRegistry,
        cursor: UpdateId,
    ) -> PollLoop {
        let dispatcher = Dispatcher::new(registry, transport.clone());
        PollLoop::new(transport, dispatcher, OffsetTracker::new(cursor), no_jitter())
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_advances_cursor_past_highest() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![Ok(vec![button_update(6, "email"), text_update(5, "hi")])],
            done.clone(),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s1, s2) = (Arc::clone(&seen), Arc::clone(&seen));
        let registry = HandlerRegistry::new()
            .with(on_text().handler(move |ctx: EventContext| {
                let s = Arc::clone(&s1);
                async move { s.lock().push(("text", ctx.update_id())) }
            }))
            .with(on_button().handler(move |ctx: EventContext| {
                let s = Arc::clone(&s2);
                async move { s.lock().push(("button", ctx.update_id())) }
            }));

        let poll = poll_loop(transport.clone(), registry, 5);
        let cursor = poll.cursor();
        let phase = poll.phase();
        let mut diagnostics = poll.diagnostics().subscribe();

        poll.run(done).await.unwrap();

        assert_eq!(cursor.get(), 7);
        assert_eq!(*seen.lock(), vec![("text", 5), ("button", 6)]);
        assert_eq!(transport.cursors(), vec![5, 7]);
        assert_eq!(*phase.borrow(), PollPhase::Stopped);
        assert_eq!(
            diagnostics.try_recv().unwrap(),
            Diagnostic::BatchProcessed {
                count: 2,
                failed: 0,
                cursor: 7
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_batch_commits_after_all_handlers() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![Ok((20..24).map(|id| text_update(id, "x")).collect())],
            done.clone(),
        );

        let tracker = OffsetTracker::new(20);
        let reader = tracker.reader();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let o = Arc::clone(&observed);
        let registry = HandlerRegistry::new().with(on_any().handler(move |ctx: EventContext| {
            let (o, reader) = (Arc::clone(&o), reader.clone());
            async move {
                // Update 20 sleeps longest and finishes last.
                let id = ctx.update_id();
                tokio::time::sleep(Duration::from_millis(100 * (24 - id) as u64)).await;
                o.lock().push((id, reader.get()));
            }
        }));

        let settings = PollSettings {
            dispatch_mode: DispatchMode::Concurrent { max_in_flight: 4 },
            ..no_jitter()
        };
        let dispatcher = Dispatcher::new(registry, transport.clone());
        let poll = PollLoop::new(transport.clone(), dispatcher, tracker, settings);
        let cursor = poll.cursor();
        poll.run(done).await.unwrap();

        let observed = observed.lock().clone();
        assert_eq!(observed.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![23, 22, 21, 20]);
        assert!(observed.iter().all(|(_, seen)| *seen == 20));
        assert_eq!(cursor.get(), 24);
        assert_eq!(transport.cursors(), vec![20, 24]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch_keeps_cursor() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(vec![Ok(vec![]), Ok(vec![])], done.clone());

        let poll = poll_loop(transport.clone(), HandlerRegistry::new(), 12);
        let cursor = poll.cursor();
        poll.run(done).await.unwrap();

        assert_eq!(cursor.get(), 12);
        assert_eq!(transport.cursors(), vec![12, 12, 12]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_suggested_delay() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![Err(TransportError::rate_limited(Some(Duration::from_secs(30))))],
            done.clone(),
        );

        let poll = poll_loop(transport.clone(), HandlerRegistry::new(), 3);
        let cursor = poll.cursor();
        let mut diagnostics = poll.diagnostics().subscribe();
        poll.run(done).await.unwrap();

        let times = transport.fetch_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(30));
        assert_eq!(transport.cursors(), vec![3, 3]);
        assert_eq!(cursor.get(), 3);
        assert!(matches!(
            diagnostics.try_recv().unwrap(),
            Diagnostic::TransportFailed {
                consecutive_failures: 1,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_and_resets() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![
                Err(TransportError::network("reset")),
                Err(TransportError::malformed("eof")),
                Ok(vec![]),
                Err(TransportError::Rejected {
                    code: 409,
                    description: "conflict".into(),
                }),
            ],
            done.clone(),
        );

        poll_loop(transport.clone(), HandlerRegistry::new(), 0)
            .run(done)
            .await
            .unwrap();

        let times = transport.fetch_times();
        let gaps: Vec<_> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps.len(), 4);
        assert!(gaps[0] >= Duration::from_secs(1) && gaps[0] < Duration::from_secs(2));
        assert!(gaps[1] >= Duration::from_secs(2) && gaps[1] < Duration::from_secs(3));
        assert!(gaps[2] < Duration::from_secs(1));
        // Counter reset by the successful fetch.
        assert!(gaps[3] >= Duration::from_secs(1) && gaps[3] < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_stops_loop() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![
                Err(TransportError::Unauthorized("bad token".into())),
                Ok(vec![text_update(1, "never")]),
            ],
            done.clone(),
        );

        let poll = poll_loop(transport.clone(), HandlerRegistry::new(), 0);
        let phase = poll.phase();
        let err = poll.run(done).await.unwrap_err();

        assert_eq!(err, TransportError::Unauthorized("bad token".into()));
        assert_eq!(transport.cursors().len(), 1);
        assert_eq!(*phase.borrow(), PollPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_handler_still_advances() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![Ok(vec![text_update(40, "boom"), text_update(41, "fine")])],
            done.clone(),
        );
        let registry = HandlerRegistry::new().with(on_any().name("strict").handler(
            |ctx: EventContext| async move {
                match ctx.event().text() {
                    Some("boom") => Err("exploded"),
                    _ => Ok(()),
                }
            },
        ));

        let poll = poll_loop(transport.clone(), registry, 40);
        let cursor = poll.cursor();
        let mut diagnostics = poll.diagnostics().subscribe();
        poll.run(done).await.unwrap();

        assert_eq!(cursor.get(), 42);
        assert_eq!(
            diagnostics.try_recv().unwrap(),
            Diagnostic::HandlerFailed {
                update_id: 40,
                route: "strict".into(),
                fault: HandlerFault::failed("exploded"),
            }
        );
        assert!(matches!(
            diagnostics.try_recv().unwrap(),
            Diagnostic::BatchProcessed { failed: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_handler_still_advances() {
        let done = CancellationToken::new();
        let transport =
            ScriptedTransport::new(vec![Ok(vec![text_update(8, "slow")])], done.clone());
        let registry = HandlerRegistry::new().with(on_any().handler(|| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }));

        let dispatcher = Dispatcher::new(registry, transport.clone())
            .with_default_timeout(Duration::from_secs(1));
        let poll = PollLoop::new(
            transport.clone(),
            dispatcher,
            OffsetTracker::new(8),
            no_jitter(),
        );
        let cursor = poll.cursor();
        poll.run(done).await.unwrap();

        assert_eq!(cursor.get(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_updates_are_not_redelivered() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![Ok(vec![text_update(3, "old"), text_update(10, "new")])],
            done.clone(),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let registry = HandlerRegistry::new().with(on_any().handler(move |ctx: EventContext| {
            let s = Arc::clone(&s);
            async move { s.lock().push(ctx.update_id()) }
        }));

        let poll = poll_loop(transport.clone(), registry, 9);
        let cursor = poll.cursor();
        poll.run(done).await.unwrap();

        assert_eq!(*seen.lock(), vec![10]);
        assert_eq!(cursor.get(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let cancel = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![Err(TransportError::rate_limited(Some(Duration::from_secs(600))))],
            CancellationToken::new(),
        );

        let poll = poll_loop(transport.clone(), HandlerRegistry::new(), 0);
        let mut phase = poll.phase();
        let task = tokio::spawn(poll.run(cancel.clone()));

        phase.wait_for(|p| *p == PollPhase::Backoff).await.unwrap();
        let started = Instant::now();
        cancel.cancel();
        task.await.unwrap().unwrap();

        assert!(Instant::now() - started < Duration::from_secs(600));
        assert_eq!(transport.cursors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_saved_after_batch_and_on_stop() {
        let done = CancellationToken::new();
        let transport = ScriptedTransport::new(
            vec![Ok(vec![text_update(1, "a")]), Ok(vec![]), Ok(vec![text_update(2, "b")])],
            done.clone(),
        );
        let store = Arc::new(MemoryCheckpoint::default());

        poll_loop(transport.clone(), HandlerRegistry::new(), 0)
            .with_checkpoint(store.clone())
            .run(done)
            .await
            .unwrap();

        assert_eq!(*store.saved.lock(), vec![2, 3, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handlers_reply_through_transport() {
        let done = CancellationToken::new();
        let transport =
            ScriptedTransport::new(vec![Ok(vec![text_update(1, "ping")])], done.clone());
        let registry = HandlerRegistry::new().with(on_text().handler(|ctx: EventContext| async move {
            ctx.responder().reply_text("pong").await.map(|_| ())
        }));

        poll_loop(transport.clone(), registry, 0)
            .run(done)
            .await
            .unwrap();

        assert_eq!(transport.sent(), vec![Action::send_text(1, "pong")]);
    }
}

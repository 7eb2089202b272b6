//! Runtime orchestration.
//!
//! [`CourierRuntime`] owns the configuration and the handler registry. It
//! wires a transport, a dispatcher and a checkpoint store into a
//! [`PollLoop`] and runs it on a background task.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//! use courier_framework::on_command;
//!
//! let runtime = CourierRuntime::builder()
//!     .config_file("courier.toml")
//!     .build()?
//!     .with(on_command("start").handler(start_handler));
//!
//! // Until Ctrl+C, SIGTERM or a fatal transport error
//! runtime.run().await?;
//! ```
//!
//! # Manual Lifecycle
//!
//! ```rust,ignore
//! let handle = runtime.start().await?;
//! let mut diagnostics = handle.subscribe();
//! // ...
//! handle.stop().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::{BoxedTransport, CursorReader, OffsetTracker, TransportError, UpdateId};
use courier_framework::{DispatchMode, Dispatcher, HandlerRegistry, Route};
use courier_transport::{BotApiClient, BotApiConfig};

use crate::backoff::BackoffPolicy;
use crate::checkpoint::{CheckpointStore, FileCheckpoint};
use crate::config::{
    ConfigError, ConfigLoader, CourierConfig, validate_config, validate_engine_config,
};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::poll::{Diagnostic, PollLoop, PollPhase, PollSettings};

/// The Courier runtime.
///
/// A runtime can be started once. Routes must be registered before
/// [`start`](Self::start); the registry is snapshotted into the dispatcher.
pub struct CourierRuntime {
    config: CourierConfig,
    registry: HandlerRegistry,
    transport: Option<BoxedTransport>,
    checkpoint: Option<Arc<dyn CheckpointStore>>,
    initial_cursor: Option<UpdateId>,
    running: AtomicBool,
}

impl CourierRuntime {
    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and initializes logging from
    /// its `logging` section.
    ///
    /// Configuration is validated on [`start`](Self::start).
    pub fn from_config(config: &CourierConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            poll_timeout_secs = config.polling.timeout_secs,
            max_in_flight = config.dispatch.max_in_flight,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            registry: HandlerRegistry::new(),
            transport: None,
            checkpoint: None,
            initial_cursor: None,
            running: AtomicBool::new(false),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Returns the handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Appends a route. Routes are tried in registration order.
    pub fn add(&mut self, route: Route) {
        self.registry.add(route);
    }

    /// Appends a route, builder style.
    pub fn with(mut self, route: Route) -> Self {
        self.registry.add(route);
        self
    }

    /// Replaces the HTTP client with a custom transport.
    ///
    /// The `api` section is then neither validated nor used.
    pub fn with_transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses `store` instead of the file named in `checkpoint.path`.
    pub fn with_checkpoint(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint = Some(store);
        self
    }

    /// Starts from `cursor`, ignoring configuration and checkpoint.
    pub fn with_initial_cursor(mut self, cursor: UpdateId) -> Self {
        self.initial_cursor = Some(cursor);
        self
    }

    /// Returns whether [`start`](Self::start) has been called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Validates configuration, resolves the initial cursor and spawns the
    /// poll loop.
    ///
    /// The initial cursor is, in order of preference: the explicit
    /// [`with_initial_cursor`](Self::with_initial_cursor) value,
    /// `polling.initial_cursor`, the checkpoint store, then `0`.
    pub async fn start(&self) -> RuntimeResult<CourierHandle> {
        if self.is_running() {
            warn!("Runtime is already running");
            return Err(RuntimeError::AlreadyRunning);
        }

        let transport = match &self.transport {
            Some(transport) => {
                validate_engine_config(&self.config)?;
                Arc::clone(transport)
            }
            None => {
                validate_config(&self.config)?;
                http_transport(&self.config)?
            }
        };
        if let Some(cursor) = self.initial_cursor
            && cursor < 0
        {
            return Err(ConfigError::validation(format!(
                "initial cursor must be non-negative, got {cursor}"
            ))
            .into());
        }

        let checkpoint = self.checkpoint.clone().or_else(|| {
            self.config
                .checkpoint
                .path
                .as_ref()
                .map(|path| Arc::new(FileCheckpoint::new(path)) as Arc<dyn CheckpointStore>)
        });
        let cursor = self.resolve_cursor(checkpoint.as_deref()).await?;

        if self.running.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyRunning);
        }

        let dispatcher = Dispatcher::new(self.registry.clone(), Arc::clone(&transport))
            .with_default_timeout(self.config.dispatch.handler_timeout());
        let settings = PollSettings {
            timeout: self.config.polling.timeout(),
            dispatch_mode: DispatchMode::from_max_in_flight(self.config.dispatch.max_in_flight),
            backoff: BackoffPolicy::from(&self.config.backoff),
        };

        let mut poll = PollLoop::new(transport, dispatcher, OffsetTracker::new(cursor), settings);
        if let Some(store) = checkpoint {
            poll = poll.with_checkpoint(store);
        }

        let cancel = CancellationToken::new();
        let handle = CourierHandle {
            phase: poll.phase(),
            diagnostics: poll.diagnostics(),
            cursor: poll.cursor(),
            cancel: cancel.clone(),
            task: tokio::spawn(poll.run(cancel)),
        };

        info!(
            cursor,
            routes = self.registry.len(),
            "Courier runtime started"
        );
        Ok(handle)
    }

    async fn resolve_cursor(
        &self,
        checkpoint: Option<&dyn CheckpointStore>,
    ) -> RuntimeResult<UpdateId> {
        if let Some(cursor) = self.initial_cursor {
            debug!(cursor, "Using explicit initial cursor");
            return Ok(cursor);
        }
        if let Some(cursor) = self.config.polling.initial_cursor {
            debug!(cursor, "Using configured initial cursor");
            return Ok(cursor);
        }
        if let Some(store) = checkpoint
            && let Some(cursor) = store.load().await?
        {
            info!(cursor, "Resuming from checkpoint");
            return Ok(cursor);
        }
        Ok(0)
    }

    /// Runs until Ctrl+C, SIGTERM, or a fatal transport error.
    pub async fn run(&self) -> RuntimeResult<()> {
        let handle = self.start().await?;
        let cancel = handle.cancellation_token();

        info!("Courier runtime is now running. Press Ctrl+C to stop.");

        let mut finished = pin!(handle.wait());
        let signalled = tokio::select! {
            result = &mut finished => return result,
            signalled = wait_for_shutdown() => signalled,
        };

        if let Err(e) = signalled {
            warn!(error = %e, "Failed to listen for shutdown signals, running until the loop stops");
            return finished.await;
        }

        cancel.cancel();
        finished.await
    }

    /// Runs until `shutdown` completes or a fatal transport error occurs.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let handle = self.start().await?;
        let cancel = handle.cancellation_token();

        let mut finished = pin!(handle.wait());
        tokio::select! {
            result = &mut finished => return result,
            _ = shutdown => {}
        };

        cancel.cancel();
        finished.await
    }
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("routes", &self.registry.len())
            .field("custom_transport", &self.transport.is_some())
            .field("initial_cursor", &self.initial_cursor)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn http_transport(config: &CourierConfig) -> RuntimeResult<BoxedTransport> {
    let mut api = BotApiConfig::new(config.api.token.clone());
    api.base_url.clone_from(&config.api.base_url);
    api.request_margin = config.api.request_margin();
    api.limit = config.polling.limit;
    api.allowed_updates = config.polling.allowed_updates.clone();

    let client = BotApiClient::new(api).map_err(RuntimeError::Transport)?;
    Ok(Arc::new(client))
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// CourierHandle
// =============================================================================

/// Control handle for a started runtime.
pub struct CourierHandle {
    phase: watch::Receiver<PollPhase>,
    diagnostics: broadcast::Sender<Diagnostic>,
    cursor: CursorReader,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), TransportError>>,
}

impl CourierHandle {
    /// Returns the current cursor.
    pub fn cursor(&self) -> UpdateId {
        self.cursor.get()
    }

    /// Returns a read-only cursor view that outlives the handle.
    pub fn reader(&self) -> CursorReader {
        self.cursor.clone()
    }

    /// Returns a receiver tracking the poll phase.
    pub fn phase(&self) -> watch::Receiver<PollPhase> {
        self.phase.clone()
    }

    /// Subscribes to handler and transport diagnostics.
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    /// Returns the token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns whether the poll task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the loop and waits until it reaches `Stopped`.
    ///
    /// A batch being dispatched is finished first.
    pub async fn stop(self) -> RuntimeResult<()> {
        info!("Stopping Courier runtime");
        self.cancel.cancel();
        self.wait().await
    }

    /// Waits for the loop to end on its own.
    ///
    /// Returns [`RuntimeError::Unauthorized`] if the platform rejected the
    /// credentials.
    pub async fn wait(self) -> RuntimeResult<()> {
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RuntimeError::Unauthorized(e)),
            Err(e) => Err(RuntimeError::Task(e.to_string())),
        }
    }
}

impl std::fmt::Debug for CourierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierHandle")
            .field("cursor", &self.cursor.get())
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`CourierRuntime`] with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = CourierRuntime::builder()
///     .config_file("deploy/courier.toml")
///     .profile("production")
///     .set("dispatch.max_in_flight", 8)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    transport: Option<BoxedTransport>,
    checkpoint: Option<Arc<dyn CheckpointStore>>,
    initial_cursor: Option<UpdateId>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder searching the current directory.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            transport: None,
            checkpoint: None,
            initial_cursor: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Overrides a single dotted configuration key.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Uses a custom transport instead of the HTTP client.
    pub fn transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses a custom checkpoint store.
    pub fn checkpoint(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint = Some(store);
        self
    }

    /// Starts from an explicit cursor.
    pub fn initial_cursor(mut self, cursor: UpdateId) -> Self {
        self.initial_cursor = Some(cursor);
        self
    }

    /// Loads configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        let config = self.config_loader.load()?;
        let mut runtime = CourierRuntime::from_config(&config);
        runtime.transport = self.transport;
        runtime.checkpoint = self.checkpoint;
        runtime.initial_cursor = self.initial_cursor;
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

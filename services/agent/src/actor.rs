//! Reconciliation actor.
//!
//! The actor owns the [`ContainerCache`] and is the only place registry
//! mutations happen. Three inputs are merged into one serialized loop:
//!
//! - **Ticker**: periodic full resync of runtime state against the registry
//! - **Input queue**: register/deregister requests produced by [`EventSink::write`]
//! - **Shutdown**: cancellation from [`ReconciliationActor::close`]
//!
//! A tick is never interleaved with event handling, and queued requests are
//! applied in arrival order.
//!
//! ## Failure policy
//!
//! - A failed register/deregister on the event path is logged and the cache
//!   is left unchanged for that record.
//! - A tick aborts on its first failed backend call without rollback; the
//!   next tick starts over from a fresh registry listing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dockwatch_events::{EventAction, LifecycleEvent};
use dockwatch_id::ContainerId;
use dockwatch_reconcile::{ContainerCache, ContainerRecord};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::RegistryBackend;
use crate::error::{ReconcileError, SinkError};
use crate::runtime::RuntimeClient;
use crate::sink::EventSink;

// =============================================================================
// Configuration
// =============================================================================

/// Actor configuration.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Interval between full resyncs.
    pub refresh_interval: Duration,

    /// Upper bound for a single tick; `None` disables the limit.
    pub tick_timeout: Option<Duration>,

    /// Capacity of the input queue.
    pub queue_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
            tick_timeout: Some(Duration::from_secs(120)),
            queue_capacity: 64,
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Actor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Processing ticks and requests.
    Running,
    /// Shutdown requested; the loop is winding down.
    Draining,
    /// The loop has exited.
    Stopped,
}

/// Requests processed by the actor loop.
#[derive(Debug)]
enum ActorMessage {
    Register(Arc<ContainerRecord>),
    Deregister(Arc<ContainerRecord>),
}

/// Outcome of a successful tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Containers found running.
    pub running: usize,
    /// Containers registered by this tick.
    pub registered: usize,
    /// Containers deregistered by this tick.
    pub deregistered: usize,
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to a running reconciliation actor.
///
/// The handle is also the actor's [`EventSink`]: lifecycle events written to
/// it are resolved to container records and queued for the loop.
pub struct ReconciliationActor {
    tx: mpsc::Sender<ActorMessage>,
    cache: Arc<ContainerCache>,
    runtime: Arc<dyn RuntimeClient>,
    shutdown: CancellationToken,
    state: watch::Receiver<ActorState>,
}

impl ReconciliationActor {
    /// Spawn the actor loop on the current tokio runtime.
    ///
    /// The first tick runs immediately.
    pub fn spawn(
        backend: Arc<dyn RegistryBackend>,
        runtime: Arc<dyn RuntimeClient>,
        config: ActorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (state_tx, state) = watch::channel(ActorState::Running);
        let cache = Arc::new(ContainerCache::new());
        let shutdown = CancellationToken::new();

        info!(
            backend = backend.name(),
            refresh_interval_secs = config.refresh_interval.as_secs(),
            tick_timeout_secs = config.tick_timeout.map(|t| t.as_secs()),
            queue_capacity = config.queue_capacity,
            "Starting reconciliation actor"
        );

        let actor_loop = ActorLoop {
            backend,
            runtime: Arc::clone(&runtime),
            cache: Arc::clone(&cache),
            config,
            rx,
            shutdown: shutdown.clone(),
            state: state_tx,
        };
        tokio::spawn(actor_loop.run());

        Self {
            tx,
            cache,
            runtime,
            shutdown,
            state,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActorState {
        *self.state.borrow()
    }

    /// Read access to the cache, for diagnostics.
    pub fn cache(&self) -> &ContainerCache {
        &self.cache
    }

    /// Stop the actor and wait for its loop to exit.
    ///
    /// Safe to call more than once and from several tasks at a time; every
    /// caller returns once the loop has stopped.
    pub async fn close(&self) {
        self.shutdown.cancel();

        let mut state = self.state.clone();
        // An error means the loop is gone, which is what we are waiting for.
        let _ = state.wait_for(|s| *s == ActorState::Stopped).await;
    }

    fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.state() == ActorState::Stopped
    }

    /// Resolve a container from the cache, falling back to the runtime.
    async fn resolve(&self, id: &ContainerId) -> Option<Arc<ContainerRecord>> {
        if let Some(record) = self.cache.get(id) {
            return Some(record);
        }

        match self.runtime.inspect(id).await {
            Ok(record) => Some(Arc::new(record)),
            Err(e) => {
                debug!(
                    container_id = %id.short(),
                    error = %e,
                    "Cannot resolve container, dropping event"
                );
                None
            }
        }
    }

    async fn enqueue(&self, message: ActorMessage) -> Result<(), SinkError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                warn!(
                    capacity = self.tx.max_capacity(),
                    "Reconciliation queue is full, waiting for capacity"
                );
                self.tx.send(message).await.map_err(|_| SinkError::Closed)
            }
            Err(TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }
}

#[async_trait]
impl EventSink for ReconciliationActor {
    async fn write(&self, event: &LifecycleEvent) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }

        let Some(id) = event.container_id() else {
            return Ok(());
        };

        let register = match &event.action {
            EventAction::Start => true,
            EventAction::Die => false,
            other => {
                debug!(container_id = %id.short(), action = %other, "No handler for event");
                return Ok(());
            }
        };

        debug!(container_id = %id.short(), action = %event.action, "Received container event");

        let Some(record) = self.resolve(&id).await else {
            return Ok(());
        };

        let message = if register {
            ActorMessage::Register(record)
        } else {
            ActorMessage::Deregister(record)
        };
        self.enqueue(message).await
    }
}

// =============================================================================
// Loop
// =============================================================================

struct ActorLoop {
    backend: Arc<dyn RegistryBackend>,
    runtime: Arc<dyn RuntimeClient>,
    cache: Arc<ContainerCache>,
    config: ActorConfig,
    rx: mpsc::Receiver<ActorMessage>,
    shutdown: CancellationToken,
    state: watch::Sender<ActorState>,
}

impl ActorLoop {
    async fn run(mut self) {
        // interval() panics on a zero period.
        let period = self.config.refresh_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Reconciliation actor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_tick().await;
                }
                message = self.rx.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => {
                        debug!("All actor handles dropped");
                        break;
                    }
                },
            }
        }

        self.state.send_replace(ActorState::Draining);
        drop(ticker);
        self.rx.close();
        let dropped = self.rx.len();
        if dropped > 0 {
            debug!(dropped, "Discarding queued requests");
        }
        self.state.send_replace(ActorState::Stopped);
        info!("Reconciliation actor stopped");
    }

    async fn handle(&self, message: ActorMessage) {
        match message {
            ActorMessage::Register(record) => match self.backend.register(&record).await {
                Ok(()) => {
                    info!(
                        container_id = %record.id.short(),
                        name = record.display_name(),
                        "Registered container"
                    );
                    self.cache.add(record);
                }
                Err(e) => {
                    error!(
                        container_id = %record.id.short(),
                        error = %e,
                        "Failed to register container"
                    );
                }
            },
            ActorMessage::Deregister(record) => match self.backend.deregister(&record).await {
                Ok(()) => {
                    info!(
                        container_id = %record.id.short(),
                        name = record.display_name(),
                        "Deregistered container"
                    );
                    self.cache.remove(&record.id);
                }
                Err(e) => {
                    error!(
                        container_id = %record.id.short(),
                        error = %e,
                        "Failed to deregister container"
                    );
                }
            },
        }
    }

    async fn run_tick(&self) {
        let result = match self.config.tick_timeout {
            Some(limit) => tokio::time::timeout(limit, self.tick())
                .await
                .unwrap_or_else(|_| Err(ReconcileError::Timeout(limit))),
            None => self.tick().await,
        };

        match result {
            Ok(summary) if summary.registered > 0 || summary.deregistered > 0 => {
                info!(
                    running = summary.running,
                    registered = summary.registered,
                    deregistered = summary.deregistered,
                    "Reconciliation tick applied changes"
                );
            }
            Ok(summary) => {
                debug!(running = summary.running, "Reconciliation tick found no drift");
            }
            Err(e) => {
                error!(error = %e, "Reconciliation tick failed");
            }
        }
    }

    /// One full resync pass.
    async fn tick(&self) -> Result<TickSummary, ReconcileError> {
        debug!("Starting reconciliation tick");

        let running = self.running_records().await?;

        let registered = self
            .backend
            .list_registered(self.runtime.as_ref())
            .await
            .map_err(ReconcileError::ListRegistered)?;
        debug!(
            running = running.len(),
            registered = registered.len(),
            "Collected runtime and registry state"
        );

        self.cache.reset(registered.into_iter().map(Arc::new));
        let diff = self.cache.diff(&running);

        for record in &diff.to_add {
            self.backend
                .register(record)
                .await
                .map_err(|source| ReconcileError::Register {
                    id: record.id.clone(),
                    source,
                })?;
            info!(container_id = %record.id.short(), "Tick registered container");
        }

        for record in &diff.to_remove {
            self.backend
                .deregister(record)
                .await
                .map_err(|source| ReconcileError::Deregister {
                    id: record.id.clone(),
                    source,
                })?;
            info!(container_id = %record.id.short(), "Tick deregistered container");
        }

        let summary = TickSummary {
            running: running.len(),
            registered: diff.to_add.len(),
            deregistered: diff.to_remove.len(),
        };
        self.cache.reset(running);
        Ok(summary)
    }

    /// Inspect every running container. Containers that disappear between
    /// listing and inspection are skipped.
    async fn running_records(&self) -> Result<Vec<Arc<ContainerRecord>>, ReconcileError> {
        let summaries = self
            .runtime
            .list_containers()
            .await
            .map_err(ReconcileError::ListContainers)?;

        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            match self.runtime.inspect(&summary.id).await {
                Ok(record) => records.push(Arc::new(record)),
                Err(e) => {
                    debug!(
                        container_id = %summary.id.short(),
                        names = ?summary.names,
                        error = %e,
                        "Skipping container that cannot be inspected"
                    );
                }
            }
        }
        Ok(records)
    }
}

//! Shared helpers for agent integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dockwatch_agent::{
    ActorConfig, BackendCall, BackendError, EventSink, MemoryBackend, MockRuntime,
    ReconciliationActor, RegistryBackend, RuntimeClient, SinkError,
};
use dockwatch_events::LifecycleEvent;
use dockwatch_id::ContainerId;
use dockwatch_reconcile::ContainerRecord;
use parking_lot::Mutex;

pub fn id(raw: &str) -> ContainerId {
    ContainerId::parse(raw).unwrap()
}

/// A running container with an address on the default bridge.
pub fn record(raw: &str) -> ContainerRecord {
    ContainerRecord::new(id(raw), format!("/{raw}"))
        .with_network("bridge", Some("172.17.0.2".parse().unwrap()))
}

/// Actor config whose only tick is the one fired at startup.
pub fn quiet_config() -> ActorConfig {
    ActorConfig {
        refresh_interval: Duration::from_secs(3600),
        tick_timeout: Some(Duration::from_secs(5)),
        queue_capacity: 16,
    }
}

pub struct Fixture {
    pub runtime: Arc<MockRuntime>,
    pub backend: Arc<MemoryBackend>,
    pub actor: Arc<ReconciliationActor>,
}

impl Fixture {
    /// Spawn an actor and wait for its startup tick to list the registry.
    pub async fn start(runtime: MockRuntime, backend: MemoryBackend) -> Self {
        Self::start_with(runtime, backend, quiet_config()).await
    }

    pub async fn start_with(runtime: MockRuntime, backend: MemoryBackend, config: ActorConfig) -> Self {
        let runtime = Arc::new(runtime);
        let backend = Arc::new(backend);
        let actor = Arc::new(ReconciliationActor::spawn(
            backend.clone(),
            runtime.clone(),
            config,
        ));

        let fixture = Self {
            runtime,
            backend,
            actor,
        };
        wait_until("startup tick", || {
            fixture.backend.calls().contains(&BackendCall::List)
        })
        .await;
        fixture
    }

    /// Calls made after the startup tick's listing.
    pub fn calls_after_list(&self) -> Vec<BackendCall> {
        self.backend
            .calls()
            .into_iter()
            .skip_while(|call| *call != BackendCall::List)
            .skip(1)
            .collect()
    }
}

/// Memory backend that holds the actor after each register or listing.
///
/// The inner backend is called first, so its journal shows the operation as
/// soon as it starts.
pub struct SlowBackend {
    pub inner: Arc<MemoryBackend>,
    pub register_delay: Duration,
    pub list_delay: Duration,
}

impl SlowBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner: Arc::new(inner),
            register_delay: Duration::ZERO,
            list_delay: Duration::ZERO,
        }
    }

    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = delay;
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }
}

#[async_trait]
impl RegistryBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    async fn register(&self, record: &ContainerRecord) -> Result<(), BackendError> {
        let result = self.inner.register(record).await;
        tokio::time::sleep(self.register_delay).await;
        result
    }

    async fn deregister(&self, record: &ContainerRecord) -> Result<(), BackendError> {
        self.inner.deregister(record).await
    }

    async fn list_registered(
        &self,
        runtime: &dyn RuntimeClient,
    ) -> Result<Vec<ContainerRecord>, BackendError> {
        let result = self.inner.list_registered(runtime).await;
        tokio::time::sleep(self.list_delay).await;
        result
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Sink that records everything written to it.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
    closed: Mutex<bool>,
    rejected: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn close(&self) {
        *self.closed.lock() = true;
    }

    /// Fail delivery of events whose actor ID is `actor_id`.
    pub fn reject(&self, actor_id: &str) {
        self.rejected.lock().push(actor_id.to_string());
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn write(&self, event: &LifecycleEvent) -> Result<(), SinkError> {
        if *self.closed.lock() {
            return Err(SinkError::Closed);
        }
        if self.rejected.lock().contains(&event.actor.id) {
            return Err(SinkError::Delivery(format!("rejected {}", event.actor.id)));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

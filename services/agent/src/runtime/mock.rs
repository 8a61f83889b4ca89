//! In-memory runtime for tests and development.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dockwatch_events::LifecycleEvent;
use dockwatch_id::ContainerId;
use dockwatch_reconcile::ContainerRecord;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use super::{ContainerSummary, EventStream, RuntimeClient, RuntimeError};

type EventSender = mpsc::UnboundedSender<Result<LifecycleEvent, RuntimeError>>;

/// Mock runtime holding a mutable set of containers and a scripted event
/// stream.
///
/// Every call to [`RuntimeClient::events`] opens a fresh subscription and
/// closes the previous one; [`MockRuntime::emit`] feeds the newest one.
#[derive(Default)]
pub struct MockRuntime {
    containers: Mutex<BTreeMap<ContainerId, ContainerRecord>>,
    failing_inspects: Mutex<HashMap<ContainerId, RuntimeError>>,
    fail_list: AtomicBool,
    subscriber: Mutex<Option<EventSender>>,
    subscriptions: AtomicUsize,
    inspect_calls: AtomicUsize,
}

impl MockRuntime {
    /// Create a mock runtime with no containers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock runtime with the given containers running.
    pub fn with_containers<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ContainerRecord>,
    {
        let runtime = Self::new();
        for record in records {
            runtime.add_container(record);
        }
        runtime
    }

    pub fn add_container(&self, record: ContainerRecord) {
        self.containers.lock().insert(record.id.clone(), record);
    }

    pub fn remove_container(&self, id: &ContainerId) {
        self.containers.lock().remove(id);
    }

    /// Make `inspect` report this container as missing even if it is listed.
    pub fn fail_inspect(&self, id: &ContainerId) {
        self.fail_inspect_with(id, RuntimeError::NotFound(id.clone()));
    }

    /// Make `inspect` fail for this container with `error`.
    pub fn fail_inspect_with(&self, id: &ContainerId, error: RuntimeError) {
        self.failing_inspects.lock().insert(id.clone(), error);
    }

    /// Make `list_containers` fail.
    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Deliver an event to the current subscriber.
    ///
    /// Returns false if nobody is subscribed.
    pub fn emit(&self, event: LifecycleEvent) -> bool {
        self.send(Ok(event))
    }

    /// Break the current subscription with a stream error.
    pub fn fail_stream(&self, reason: &str) -> bool {
        self.send(Err(RuntimeError::Stream(reason.to_string())))
    }

    /// Number of times `events` has been called.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Number of times `inspect` has been called.
    pub fn inspect_count(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    fn send(&self, item: Result<LifecycleEvent, RuntimeError>) -> bool {
        match self.subscriber.lock().as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(RuntimeError::Api(
                "mock runtime configured to fail listing".to_string(),
            ));
        }

        Ok(self
            .containers
            .lock()
            .values()
            .filter(|record| record.running)
            .map(|record| ContainerSummary {
                id: record.id.clone(),
                names: vec![record.name.clone()],
            })
            .collect())
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerRecord, RuntimeError> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        debug!(container_id = %id.short(), "[MOCK] Inspecting container");

        if let Some(error) = self.failing_inspects.lock().get(id) {
            return Err(error.clone());
        }

        self.containers
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.clone()))
    }

    fn events(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock() = Some(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        UnboundedReceiverStream::new(rx).boxed()
    }
}

//! In-process registry backend.
//!
//! Keeps registrations in memory and records every call, so tests can assert
//! on exactly what the reconciler asked the registry to do.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dockwatch_id::ContainerId;
use dockwatch_reconcile::ContainerRecord;
use parking_lot::Mutex;
use tracing::debug;

use super::{BackendError, BackendOptions, RegistryBackend};
use crate::runtime::RuntimeClient;

/// A call made against a [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Register(ContainerId),
    Deregister(ContainerId),
    List,
}

/// Registry backend holding registrations in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    registered: Mutex<BTreeMap<ContainerId, ContainerRecord>>,
    calls: Mutex<Vec<BackendCall>>,
    failing: Mutex<HashSet<ContainerId>>,
    fail_listing: AtomicBool,
}

impl MemoryBackend {
    pub const NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds these registrations.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ContainerRecord>,
    {
        let backend = Self::new();
        {
            let mut registered = backend.registered.lock();
            for record in records {
                registered.insert(record.id.clone(), record);
            }
        }
        backend
    }

    /// Factory for [`super::BackendRegistry`]. The connection string is
    /// only used for logging.
    pub fn factory(
        connection: &str,
        _options: &BackendOptions,
    ) -> Result<Arc<dyn RegistryBackend>, BackendError> {
        debug!(connection, "Creating in-memory registry");
        Ok(Arc::new(Self::new()))
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Currently registered container IDs, sorted.
    pub fn registered_ids(&self) -> Vec<ContainerId> {
        self.registered.lock().keys().cloned().collect()
    }

    pub fn is_registered(&self, id: &ContainerId) -> bool {
        self.registered.lock().contains_key(id)
    }

    /// Reject register and deregister calls for this container.
    pub fn fail_for(&self, id: &ContainerId) {
        self.failing.lock().insert(id.clone());
    }

    pub fn clear_failure(&self, id: &ContainerId) {
        self.failing.lock().remove(id);
    }

    /// Make `list_registered` fail.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    fn check_failure(&self, id: &ContainerId) -> Result<(), BackendError> {
        if self.failing.lock().contains(id) {
            return Err(BackendError::Rejected {
                id: id.clone(),
                reason: "memory backend configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn register(&self, record: &ContainerRecord) -> Result<(), BackendError> {
        self.calls.lock().push(BackendCall::Register(record.id.clone()));
        self.check_failure(&record.id)?;

        self.registered
            .lock()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn deregister(&self, record: &ContainerRecord) -> Result<(), BackendError> {
        self.calls
            .lock()
            .push(BackendCall::Deregister(record.id.clone()));
        self.check_failure(&record.id)?;

        self.registered.lock().remove(&record.id);
        Ok(())
    }

    async fn list_registered(
        &self,
        _runtime: &dyn RuntimeClient,
    ) -> Result<Vec<ContainerRecord>, BackendError> {
        self.calls.lock().push(BackendCall::List);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                body: "memory backend configured to fail listing".to_string(),
            });
        }

        Ok(self.registered.lock().values().cloned().collect())
    }
}

//! Service registry backends.
//!
//! A backend mirrors container identities into an external service-discovery
//! system. Backends are constructed by name from an address of the form
//! `<backend>://<connection>` through an explicit [`BackendRegistry`] built
//! by the caller, so there is no process-global registration state.
//!
//! ## Backends
//!
//! - `consul`: Consul agent HTTP API
//! - `memory`: in-process store, for dry runs and tests

mod consul;
mod memory;
mod naming;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dockwatch_id::ContainerId;
use dockwatch_reconcile::ContainerRecord;
use thiserror::Error;

use crate::runtime::{RuntimeClient, RuntimeError};

pub use consul::{ConsulBackend, ServiceDefinition, MANAGED_BY_META_KEY, MANAGED_BY_META_VALUE};
pub use memory::{BackendCall, MemoryBackend};
pub use naming::{NamingMode, COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL};

/// Separator between backend name and connection string.
const ADDRESS_SEPARATOR: &str = "://";

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by backends and the backend table.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The address is not `<backend>://<connection>`.
    #[error("invalid service backend address {0:?}: expected <backend>://<connection>")]
    InvalidAddress(String),

    /// No factory is registered under this name.
    #[error("service backend not found: {0}")]
    UnknownBackend(String),

    /// A factory is already registered under this name.
    #[error("service backend has already been registered: {0}")]
    DuplicateBackend(String),

    /// A backend option has an unusable value.
    #[error("invalid backend option {key}: {message}")]
    InvalidOption { key: &'static str, message: String },

    /// Transport-level failure talking to the registry.
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered with a non-success status.
    #[error("registry returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The registry rejected the operation for this container.
    #[error("registry rejected container {id}: {reason}")]
    Rejected { id: ContainerId, reason: String },

    /// A runtime call made on the backend's behalf failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

// =============================================================================
// Contract
// =============================================================================

/// Registration operations the reconciler applies.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Backend name, as used in addresses.
    fn name(&self) -> &str;

    /// Check that the registry is reachable.
    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Register a container. Containers the backend chooses to ignore
    /// succeed without a registry write.
    async fn register(&self, record: &ContainerRecord) -> Result<(), BackendError>;

    /// Deregister a container. Unknown containers succeed.
    async fn deregister(&self, record: &ContainerRecord) -> Result<(), BackendError>;

    /// Enumerate what the registry currently holds, as container records.
    ///
    /// Backends that only store IDs use `runtime` to recover full records.
    async fn list_registered(
        &self,
        runtime: &dyn RuntimeClient,
    ) -> Result<Vec<ContainerRecord>, BackendError>;
}

// =============================================================================
// Address
// =============================================================================

/// Parsed `<backend>://<connection>` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddress {
    pub backend: String,
    pub connection: String,
}

impl BackendAddress {
    pub fn parse(s: &str) -> Result<Self, BackendError> {
        let Some((backend, connection)) = s.split_once(ADDRESS_SEPARATOR) else {
            return Err(BackendError::InvalidAddress(s.to_string()));
        };

        if backend.is_empty() || connection.is_empty() {
            return Err(BackendError::InvalidAddress(s.to_string()));
        }

        Ok(Self {
            backend: backend.to_string(),
            connection: connection.to_string(),
        })
    }
}

impl FromStr for BackendAddress {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.backend, ADDRESS_SEPARATOR, self.connection)
    }
}

/// Options passed to backend factories.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// How containers map to service names.
    pub naming: NamingMode,

    /// Timeout for a single registry request.
    pub request_timeout: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            naming: NamingMode::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Constructor for a backend from its connection string.
pub type BackendFactory = Box<
    dyn Fn(&str, &BackendOptions) -> Result<Arc<dyn RegistryBackend>, BackendError>
        + Send
        + Sync,
>;

/// Table of backend constructors keyed by name.
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with the backends shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .factories
            .insert(ConsulBackend::NAME.to_string(), Box::new(ConsulBackend::factory));
        registry
            .factories
            .insert(MemoryBackend::NAME.to_string(), Box::new(MemoryBackend::factory));
        registry
    }

    /// Add a constructor under `name`.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), BackendError>
    where
        F: Fn(&str, &BackendOptions) -> Result<Arc<dyn RegistryBackend>, BackendError>
            + Send
            + Sync
            + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(BackendError::DuplicateBackend(name.to_string()));
        }
        self.factories.insert(name.to_string(), Box::new(factory));
        Ok(())
    }

    /// Construct the backend named by `address`.
    pub fn create(
        &self,
        address: &BackendAddress,
        options: &BackendOptions,
    ) -> Result<Arc<dyn RegistryBackend>, BackendError> {
        let factory = self
            .factories
            .get(&address.backend)
            .ok_or_else(|| BackendError::UnknownBackend(address.backend.clone()))?;
        factory(&address.connection, options)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

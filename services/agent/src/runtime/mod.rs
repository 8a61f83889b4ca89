//! Container runtime interface.
//!
//! The runtime interface abstracts the three things the reconciler needs
//! from the host:
//! - Listing the containers currently running
//! - Inspecting one container into a full [`ContainerRecord`]
//! - Subscribing to the lifecycle event stream
//!
//! `DockerRuntime` talks to the Docker Engine API; `MockRuntime` is an
//! in-memory implementation for tests and development.

mod docker;
mod mock;

use async_trait::async_trait;
use dockwatch_events::LifecycleEvent;
use dockwatch_id::ContainerId;
use dockwatch_reconcile::ContainerRecord;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use docker::DockerRuntime;
pub use mock::MockRuntime;

/// Live runtime events. Dropping the stream unsubscribes.
pub type EventStream = BoxStream<'static, Result<LifecycleEvent, RuntimeError>>;

/// Errors returned by a runtime client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime could not be reached.
    #[error("failed to connect to container runtime: {0}")]
    Connection(String),

    /// The container does not exist (any more).
    #[error("container not found: {0}")]
    NotFound(ContainerId),

    /// The event stream failed; callers resubscribe.
    #[error("event stream error: {0}")]
    Stream(String),

    /// The runtime answered with something we cannot use.
    #[error("malformed runtime response: {0}")]
    Malformed(String),

    /// Any other API failure.
    #[error("runtime API error: {0}")]
    Api(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

/// Minimal listing entry; inspect it to get the full record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub names: Vec<String>,
}

/// Container runtime operations consumed by the reconciler.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Check that the runtime is reachable.
    async fn ping(&self) -> Result<(), RuntimeError>;

    /// List running containers.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Inspect one container.
    async fn inspect(&self, id: &ContainerId) -> Result<ContainerRecord, RuntimeError>;

    /// Subscribe to runtime events.
    ///
    /// The stream yields an error (or ends) when the subscription breaks;
    /// resubscribing is the caller's responsibility.
    fn events(&self) -> EventStream;
}

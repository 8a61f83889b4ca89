//! Error types for the reconciliation pipeline.

use std::time::Duration;

use dockwatch_id::ContainerId;
use thiserror::Error;

use crate::backend::BackendError;
use crate::runtime::RuntimeError;

/// Errors returned when delivering an event to a sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The consumer has stopped; no further events are accepted.
    #[error("sink is closed")]
    Closed,

    /// The event could not be delivered, but the sink is still open.
    #[error("event delivery failed: {0}")]
    Delivery(String),
}

/// Errors that abort a reconciliation tick.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to list runtime containers: {0}")]
    ListContainers(#[source] RuntimeError),

    #[error("failed to list registered services: {0}")]
    ListRegistered(#[source] BackendError),

    #[error("failed to register container {id}: {source}")]
    Register {
        id: ContainerId,
        #[source]
        source: BackendError,
    },

    #[error("failed to deregister container {id}: {source}")]
    Deregister {
        id: ContainerId,
        #[source]
        source: BackendError,
    },

    #[error("reconciliation tick exceeded {0:?}")]
    Timeout(Duration),
}

/// Reasons an event source stops.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The context was cancelled.
    #[error("event source cancelled")]
    Cancelled,

    /// The sink stopped accepting events.
    #[error("event sink closed")]
    SinkClosed,
}

impl SourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SourceError::Cancelled)
    }
}

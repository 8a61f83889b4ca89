//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when decoding runtime events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A required field was absent from the raw message.
    #[error("event is missing field: {0}")]
    MissingField(&'static str),

    /// The event timestamp is out of range.
    #[error("invalid event timestamp: {0}")]
    InvalidTimestamp(i64),
}

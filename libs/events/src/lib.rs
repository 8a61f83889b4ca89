//! # dockwatch-events
//!
//! Container runtime event types and the predicate that selects the
//! lifecycle events the reconciler cares about.
//!
//! ## Design Principles
//!
//! - Events are immutable, ephemeral records consumed exactly once
//! - Every event is scoped to one resource (container, network, image, ...)
//! - Unknown scopes and actions are preserved rather than rejected, so the
//!   filter, not the decoder, decides what is interesting
//!
//! ## Event Selection
//!
//! Only container events with the actions `start`, `die` and `restore` pass
//! [`LifecycleFilter`]. Everything else is dropped before it reaches the
//! reconciliation actor.

mod envelope;
mod error;
mod filter;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use filter::{EventMatcher, LifecycleFilter};
pub use types::*;

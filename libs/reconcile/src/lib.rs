//! Reconciliation primitives.
//!
//! This library provides the state the reconciliation actor converges on:
//!
//! - **Container record**: an immutable snapshot of one container, produced by
//!   inspecting the runtime and replaced wholesale, never edited.
//! - **Container cache**: the engine's best-known view of what should be
//!   registered right now (not necessarily what the registry holds).
//! - **Diff**: the ID-set comparison between the cache and a candidate list.
//!
//! # Invariants
//!
//! - Diffing compares IDs only; field changes on a record are not a diff
//! - `reset` is atomic: no reader observes a half-replaced cache
//! - No cache operation can fail

mod cache;
mod record;

pub use cache::{ContainerCache, Diff};
pub use record::{ContainerRecord, NetworkEndpoint};

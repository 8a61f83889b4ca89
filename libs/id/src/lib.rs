//! # dockwatch-id
//!
//! Identity types shared by every dockwatch crate.
//!
//! ## Design Principles
//!
//! - Container IDs are opaque and assigned by the runtime; we never generate them
//! - An ID is stable for the lifetime of the container it names
//! - IDs are typed so a container ID cannot be confused with a service name
//!
//! ## ID Format
//!
//! Docker assigns 64-character lowercase hex IDs, but the engine only relies on
//! the value being non-empty and free of whitespace. Registries such as Consul
//! store the full ID as the service ID, so it must round-trip unchanged.

mod error;
mod types;

pub use error::IdError;
pub use types::*;

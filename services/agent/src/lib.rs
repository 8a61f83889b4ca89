//! dockwatch agent.
//!
//! Keeps a service registry synchronized with the containers running on one
//! host. Two change sources feed a single reconciliation actor:
//!
//! - **Event source**: the runtime's lifecycle event stream, filtered to
//!   container start/die/restore
//! - **Ticker**: a periodic full resync that repairs missed events and
//!   registry-side drift
//!
//! ## Architecture
//!
//! ```text
//! RuntimeClient --events--> EventSource --FilteredSink--> ReconciliationActor
//!                                                          |  tick / register / deregister
//!                                                          v
//!                                                    RegistryBackend
//! ```
//!
//! The [`Orchestrator`] wires the pieces together and owns shutdown.

pub mod actor;
pub mod backend;
pub mod backoff;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod runtime;
pub mod sink;
pub mod source;

pub use actor::{ActorConfig, ActorState, ReconciliationActor, TickSummary};
pub use backend::{
    BackendAddress, BackendCall, BackendError, BackendOptions, BackendRegistry, ConsulBackend,
    MemoryBackend, NamingMode, RegistryBackend,
};
pub use backoff::BackoffPolicy;
pub use config::{Cli, Config, ConfigError};
pub use error::{ReconcileError, SinkError, SourceError};
pub use orchestrator::Orchestrator;
pub use runtime::{ContainerSummary, DockerRuntime, MockRuntime, RuntimeClient, RuntimeError};
pub use sink::{EventSink, FilteredSink};
pub use source::EventSource;

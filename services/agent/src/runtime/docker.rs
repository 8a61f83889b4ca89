//! Docker Engine runtime client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerInspectResponse, EventMessage};
use bollard::system::EventsOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use dockwatch_events::{EventError, LifecycleEvent};
use dockwatch_id::ContainerId;
use dockwatch_reconcile::{ContainerRecord, NetworkEndpoint};
use futures_util::StreamExt;
use tracing::{debug, info};

use super::{ContainerSummary, EventStream, RuntimeClient, RuntimeError};

/// Request timeout for Docker API calls, in seconds.
const DOCKER_TIMEOUT_SECS: u64 = 120;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Runtime client backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to a Docker host.
    ///
    /// `None` or an empty host uses the local defaults (`DOCKER_HOST` or the
    /// platform socket). `tcp://` and `http://` hosts use HTTP; anything else
    /// is treated as a unix socket path (with or without `unix://`).
    pub fn connect(host: Option<&str>) -> Result<Self, RuntimeError> {
        let docker = match host.map(str::trim) {
            None | Some("") => Docker::connect_with_local_defaults(),
            Some(h) if h.starts_with("tcp://") || h.starts_with("http://") => {
                Docker::connect_with_http(h, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(h) => Docker::connect_with_socket(h, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION),
        }
        .map_err(|e| RuntimeError::Connection(e.to_string()))?;

        info!(host = host.unwrap_or("default"), "Docker client configured");
        Ok(Self::from_client(docker))
    }

    /// Wrap an existing bollard client.
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Connection(e.to_string()))
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = ContainerId::parse(c.id.as_deref()?).ok()?;
                Some(ContainerSummary {
                    id,
                    names: c.names.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerRecord, RuntimeError> {
        match self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => record_from_inspect(response),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(RuntimeError::NotFound(id.clone())),
            Err(e) => Err(RuntimeError::Api(e.to_string())),
        }
    }

    fn events(&self) -> EventStream {
        self.docker
            .events(Some(EventsOptions::<String>::default()))
            .filter_map(|item| async move {
                match item {
                    Ok(message) => match event_from_message(message) {
                        Ok(event) => Some(Ok(event)),
                        Err(e) => {
                            debug!(error = %e, "Skipping undecodable runtime event");
                            None
                        }
                    },
                    Err(e) => Some(Err(RuntimeError::Stream(e.to_string()))),
                }
            })
            .boxed()
    }
}

// =============================================================================
// Mapping
// =============================================================================

fn record_from_inspect(response: ContainerInspectResponse) -> Result<ContainerRecord, RuntimeError> {
    let raw_id = response
        .id
        .ok_or_else(|| RuntimeError::Malformed("inspect response without Id".to_string()))?;
    let id = ContainerId::parse(&raw_id)
        .map_err(|e| RuntimeError::Malformed(format!("container id {raw_id:?}: {e}")))?;

    let labels = response
        .config
        .and_then(|config| config.labels)
        .unwrap_or_default()
        .into_iter()
        .collect();

    let networks: BTreeMap<String, NetworkEndpoint> = response
        .network_settings
        .and_then(|settings| settings.networks)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, endpoint)| {
            let ip_address = endpoint
                .ip_address
                .filter(|ip| !ip.is_empty())
                .and_then(|ip| ip.parse().ok());
            (name, NetworkEndpoint { ip_address })
        })
        .collect();

    let running = response
        .state
        .and_then(|state| state.running)
        .unwrap_or(false);

    Ok(ContainerRecord {
        id,
        name: response.name.unwrap_or_default(),
        labels,
        networks,
        running,
    })
}

fn event_from_message(message: EventMessage) -> Result<LifecycleEvent, EventError> {
    let scope = message
        .typ
        .ok_or(EventError::MissingField("Type"))?
        .to_string();
    let action = message.action.ok_or(EventError::MissingField("Action"))?;
    let actor = message.actor.ok_or(EventError::MissingField("Actor"))?;
    let actor_id = actor.id.ok_or(EventError::MissingField("Actor.ID"))?;

    let mut event = LifecycleEvent::new(scope.as_str(), action, actor_id);
    event.actor.attributes = actor.attributes.unwrap_or_default().into_iter().collect();

    if let Some(nanos) = message.time_nano {
        let secs = nanos.div_euclid(NANOS_PER_SEC);
        let subsec = nanos.rem_euclid(NANOS_PER_SEC) as u32;
        event = event.with_unix_time(secs, subsec)?;
    } else if let Some(secs) = message.time {
        event = event.with_unix_time(secs, 0)?;
    }

    Ok(event)
}

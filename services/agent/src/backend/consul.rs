//! Consul agent backend.
//!
//! Talks to the local Consul agent's HTTP API:
//! - `PUT /v1/agent/service/register`
//! - `PUT /v1/agent/service/deregister/{id}`
//! - `GET /v1/agent/services`
//!
//! The container ID is used as the Consul service ID, so a registration can
//! always be traced back to the container that produced it. Registrations
//! also carry a [`MANAGED_BY_META_KEY`] marker; the agent is shared with
//! other writers and only marked entries are ever treated as ours.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dockwatch_id::ContainerId;
use dockwatch_reconcile::ContainerRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{BackendError, BackendOptions, NamingMode, RegistryBackend};
use crate::runtime::RuntimeClient;

/// Service name Consul registers for itself.
const CONSUL_SELF_SERVICE: &str = "consul";

/// Service meta key marking registrations written by dockwatch.
pub const MANAGED_BY_META_KEY: &str = "managed-by";

/// Value stored under [`MANAGED_BY_META_KEY`].
pub const MANAGED_BY_META_VALUE: &str = "dockwatch";

/// Service registration as sent to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "Tags", default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(rename = "Meta", default)]
    pub meta: BTreeMap<String, String>,
}

impl ServiceDefinition {
    /// Build the registration for a container, or `None` if the container
    /// has no derivable name or no reachable address.
    pub fn from_record(record: &ContainerRecord, naming: NamingMode) -> Option<Self> {
        let Some((name, tags)) = naming.service_name_and_tags(record) else {
            info!(
                container_id = %record.id.short(),
                mode = %naming,
                "Container has no service name, ignoring"
            );
            return None;
        };

        let Some(address) = record.primary_address() else {
            debug!(
                container_id = %record.id.short(),
                "Container has no address, ignoring"
            );
            return None;
        };

        Some(Self {
            id: record.id.to_string(),
            name,
            address: address.to_string(),
            tags,
            meta: BTreeMap::from([(
                MANAGED_BY_META_KEY.to_string(),
                MANAGED_BY_META_VALUE.to_string(),
            )]),
        })
    }
}

/// Entry returned by `GET /v1/agent/services`.
#[derive(Debug, Clone, Deserialize)]
struct AgentService {
    #[serde(rename = "ID")]
    id: String,

    #[serde(rename = "Service")]
    service: String,

    #[serde(rename = "Address", default)]
    address: String,

    #[serde(rename = "Meta", default)]
    meta: Option<HashMap<String, String>>,
}

impl AgentService {
    fn is_managed(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|meta| meta.get(MANAGED_BY_META_KEY))
            .is_some_and(|value| value == MANAGED_BY_META_VALUE)
    }
}

/// Registry backend for a Consul agent.
pub struct ConsulBackend {
    client: reqwest::Client,
    base_url: String,
    naming: NamingMode,
}

impl ConsulBackend {
    pub const NAME: &'static str = "consul";

    /// Create a backend for the agent at `connection` (`host:port` or URL).
    pub fn new(connection: &str, options: &BackendOptions) -> Result<Self, BackendError> {
        let connection = connection.trim().trim_end_matches('/');
        if connection.is_empty() {
            return Err(BackendError::InvalidAddress(connection.to_string()));
        }

        let base_url = if connection.contains("://") {
            connection.to_string()
        } else {
            format!("http://{connection}")
        };

        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            naming: options.naming,
        })
    }

    /// Factory for [`super::BackendRegistry`].
    pub fn factory(
        connection: &str,
        options: &BackendOptions,
    ) -> Result<Arc<dyn RegistryBackend>, BackendError> {
        Ok(Arc::new(Self::new(connection, options)?))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn services(&self) -> Result<HashMap<String, AgentService>, BackendError> {
        let url = format!("{}/v1/agent/services", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status { status, body })
}

#[async_trait]
impl RegistryBackend for ConsulBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let url = format!("{}/v1/agent/self", self.base_url);
        let response = self.client.get(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn register(&self, record: &ContainerRecord) -> Result<(), BackendError> {
        debug!(container_id = %record.id.short(), "Consul: registering container");

        let Some(definition) = ServiceDefinition::from_record(record, self.naming) else {
            return Ok(());
        };

        let url = format!("{}/v1/agent/service/register", self.base_url);
        let response = self.client.put(&url).json(&definition).send().await?;
        if let Err(e) = check_status(response).await {
            warn!(
                container_id = %record.id.short(),
                service = %definition.name,
                error = %e,
                "Consul: registration failed"
            );
            return Err(e);
        }

        Ok(())
    }

    async fn deregister(&self, record: &ContainerRecord) -> Result<(), BackendError> {
        info!(container_id = %record.id.short(), "Consul: deregistering container");

        let services = self.services().await?;
        if !services.contains_key(record.id.as_str()) {
            return Ok(());
        }

        let url = format!(
            "{}/v1/agent/service/deregister/{}",
            self.base_url, record.id
        );
        let response = self.client.put(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn list_registered(
        &self,
        runtime: &dyn RuntimeClient,
    ) -> Result<Vec<ContainerRecord>, BackendError> {
        let services = self.services().await?;

        let mut records = Vec::with_capacity(services.len());
        for service in services.into_values() {
            if service.service == CONSUL_SELF_SERVICE {
                continue;
            }

            let Ok(id) = ContainerId::parse(&service.id) else {
                warn!(service_id = %service.id, "Consul: skipping service with unusable ID");
                continue;
            };

            match runtime.inspect(&id).await {
                Ok(record) => records.push(record),
                // Gone from the runtime: keep our own stale registrations
                // visible so the diff removes them.
                Err(e) if e.is_not_found() && service.is_managed() => {
                    debug!(
                        container_id = %id.short(),
                        "Consul: registered container is gone, using registry entry"
                    );
                    records.push(record_from_service(id, &service));
                }
                Err(e) if e.is_not_found() => {
                    debug!(
                        service_id = %service.id,
                        service = %service.service,
                        "Consul: skipping service not registered by dockwatch"
                    );
                }
                Err(e) => {
                    warn!(
                        container_id = %id.short(),
                        error = %e,
                        "Consul: cannot inspect registered container, skipping"
                    );
                }
            }
        }

        Ok(records)
    }
}

/// Minimal record for a registration whose container is gone.
fn record_from_service(id: ContainerId, service: &AgentService) -> ContainerRecord {
    let address: Option<IpAddr> = service.address.parse().ok();
    ContainerRecord::new(id, service.service.clone())
        .with_network(CONSUL_SELF_SERVICE, address)
        .with_running(false)
}

//! Container snapshots.

use std::collections::BTreeMap;
use std::net::IpAddr;

use dockwatch_id::ContainerId;
use serde::{Deserialize, Serialize};

/// Network names with this prefix share another container's namespace and
/// carry no address of their own.
const SHARED_NAMESPACE_PREFIX: &str = "container:";

/// One network attachment of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkEndpoint {
    /// IPv4 (or IPv6) address on this network, if one was assigned.
    pub ip_address: Option<IpAddr>,
}

/// Immutable snapshot of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Runtime-assigned identity.
    pub id: ContainerId,

    /// Name as reported by the runtime (Docker prefixes it with `/`).
    pub name: String,

    /// Container labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Network attachments keyed by network name.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkEndpoint>,

    /// Whether the container was running when inspected.
    pub running: bool,
}

impl ContainerRecord {
    /// Create a running record with no labels or networks.
    pub fn new(id: ContainerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            labels: BTreeMap::new(),
            networks: BTreeMap::new(),
            running: true,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_network(mut self, network: impl Into<String>, ip_address: Option<IpAddr>) -> Self {
        self.networks
            .insert(network.into(), NetworkEndpoint { ip_address });
        self
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    /// The container name without Docker's leading path.
    pub fn display_name(&self) -> &str {
        match self.name.rfind('/') {
            Some(i) => &self.name[i + 1..],
            None => &self.name,
        }
    }

    /// Look up a label value, treating empty values as absent.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The address other services should use to reach this container.
    ///
    /// Picks the first network (by name) that owns its namespace and has an
    /// address assigned.
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.networks
            .iter()
            .filter(|(name, _)| !name.starts_with(SHARED_NAMESPACE_PREFIX))
            .find_map(|(_, endpoint)| endpoint.ip_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ContainerId {
        ContainerId::parse(s).unwrap()
    }

    #[test]
    fn test_display_name_strips_path() {
        assert_eq!(ContainerRecord::new(id("c1"), "/web_1").display_name(), "web_1");
        assert_eq!(ContainerRecord::new(id("c1"), "web_1").display_name(), "web_1");
        assert_eq!(ContainerRecord::new(id("c1"), "/a/b").display_name(), "b");
    }

    #[test]
    fn test_primary_address_skips_shared_namespace() {
        let record = ContainerRecord::new(id("c1"), "/web")
            .with_network("container:abc", Some("10.0.0.9".parse().unwrap()))
            .with_network("frontend", None)
            .with_network("overlay", Some("10.0.1.5".parse().unwrap()));

        assert_eq!(record.primary_address(), Some("10.0.1.5".parse().unwrap()));
    }

    #[test]
    fn test_primary_address_none_without_networks() {
        assert_eq!(ContainerRecord::new(id("c1"), "/web").primary_address(), None);
    }

    #[test]
    fn test_empty_label_is_absent() {
        let record = ContainerRecord::new(id("c1"), "/web")
            .with_label("com.docker.compose.project", "")
            .with_label("tier", "front");
        assert_eq!(record.label("com.docker.compose.project"), None);
        assert_eq!(record.label("tier"), Some("front"));
    }
}

//! Service naming strategies.
//!
//! A naming mode derives the logical service name and tags a container is
//! registered under. A container for which no name can be derived is not
//! registered at all.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use dockwatch_reconcile::ContainerRecord;

use super::BackendError;

/// Compose label carrying the project name.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Compose label carrying the service name.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// How a container maps to a service name and tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NamingMode {
    /// Service name is the container name; no tags.
    Name,
    /// Service name is the compose project; tags carry the compose service
    /// and container names.
    #[default]
    DockerCompose,
}

impl NamingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingMode::Name => "name",
            NamingMode::DockerCompose => "docker-compose",
        }
    }

    /// Derive `(service name, tags)`, or `None` if the container should not
    /// be registered.
    pub fn service_name_and_tags(&self, record: &ContainerRecord) -> Option<(String, Vec<String>)> {
        match self {
            NamingMode::Name => container_name_and_tags(record),
            NamingMode::DockerCompose => compose_name_and_tags(record),
        }
    }
}

impl fmt::Display for NamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamingMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(NamingMode::Name),
            "docker-compose" => Ok(NamingMode::DockerCompose),
            other => Err(BackendError::InvalidOption {
                key: "mode",
                message: format!("unknown naming mode {other:?}"),
            }),
        }
    }
}

fn container_name_and_tags(record: &ContainerRecord) -> Option<(String, Vec<String>)> {
    let name = record.display_name();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), Vec::new()))
}

fn compose_name_and_tags(record: &ContainerRecord) -> Option<(String, Vec<String>)> {
    let project = record.label(COMPOSE_PROJECT_LABEL)?;
    let container_name = record.display_name();

    let mut tags = Vec::with_capacity(3);
    if let Some(service) = record.label(COMPOSE_SERVICE_LABEL) {
        tags.push(service.to_string());
    }
    if !container_name.is_empty() {
        tags.push(container_name.to_string());
    }
    if let Some(short) = container_name
        .strip_prefix(project)
        .and_then(|rest| rest.strip_prefix('_'))
    {
        if !short.is_empty() {
            tags.push(short.to_string());
        }
    }

    Some((project.to_string(), tags))
}

#[cfg(test)]
mod tests {
    use dockwatch_id::ContainerId;
    use rstest::rstest;

    use super::*;

    fn record(name: &str) -> ContainerRecord {
        ContainerRecord::new(ContainerId::parse("c1").unwrap(), name)
    }

    #[test]
    fn test_name_mode() {
        let (name, tags) = NamingMode::Name
            .service_name_and_tags(&record("/redis"))
            .unwrap();
        assert_eq!(name, "redis");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_name_mode_empty_name_is_ignored() {
        assert_eq!(NamingMode::Name.service_name_and_tags(&record("")), None);
    }

    #[test]
    fn test_compose_mode() {
        let record = record("/shop_web_1")
            .with_label(COMPOSE_PROJECT_LABEL, "shop")
            .with_label(COMPOSE_SERVICE_LABEL, "web");

        let (name, tags) = NamingMode::DockerCompose
            .service_name_and_tags(&record)
            .unwrap();
        assert_eq!(name, "shop");
        assert_eq!(tags, vec!["web", "shop_web_1", "web_1"]);
    }

    #[test]
    fn test_compose_mode_without_project_prefix() {
        let record = record("/custom")
            .with_label(COMPOSE_PROJECT_LABEL, "shop")
            .with_label(COMPOSE_SERVICE_LABEL, "web");

        let (_, tags) = NamingMode::DockerCompose
            .service_name_and_tags(&record)
            .unwrap();
        assert_eq!(tags, vec!["web", "custom"]);
    }

    #[test]
    fn test_compose_mode_keeps_characters_shared_with_project() {
        // A cutset trim would also eat the leading "s" of "search".
        let record = record("/shop_search_1").with_label(COMPOSE_PROJECT_LABEL, "shop");

        let (_, tags) = NamingMode::DockerCompose
            .service_name_and_tags(&record)
            .unwrap();
        assert_eq!(tags, vec!["shop_search_1", "search_1"]);
    }

    #[test]
    fn test_compose_mode_requires_project_label() {
        let record = record("/standalone").with_label(COMPOSE_SERVICE_LABEL, "web");
        assert_eq!(NamingMode::DockerCompose.service_name_and_tags(&record), None);
    }

    #[rstest]
    #[case("name", NamingMode::Name)]
    #[case("docker-compose", NamingMode::DockerCompose)]
    fn test_parse(#[case] input: &str, #[case] expected: NamingMode) {
        assert_eq!(input.parse::<NamingMode>().unwrap(), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[test]
    fn test_parse_unknown() {
        assert!("compose".parse::<NamingMode>().is_err());
    }
}

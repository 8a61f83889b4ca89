//! Event envelope - a single runtime event and the resource it refers to.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dockwatch_id::ContainerId;
use serde::{Deserialize, Serialize};

use crate::{EventAction, EventError, EventScope};

/// The resource an event is about, plus whatever metadata the runtime attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventActor {
    /// Runtime-native identifier (container ID, network ID, image name, ...).
    pub id: String,

    /// Free-form attributes (`name`, `image`, labels, exit code, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A runtime event as consumed by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Resource type.
    pub scope: EventScope,

    /// What happened.
    pub action: EventAction,

    /// The resource the event refers to.
    pub actor: EventActor,

    /// When the runtime observed the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl LifecycleEvent {
    /// Create an event with no attributes or timestamp.
    pub fn new(
        scope: impl Into<EventScope>,
        action: impl Into<EventAction>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            action: action.into(),
            actor: EventActor {
                id: actor_id.into(),
                attributes: BTreeMap::new(),
            },
            time: None,
        }
    }

    /// Shorthand for a container-scoped event.
    pub fn container(action: impl Into<EventAction>, id: &ContainerId) -> Self {
        Self::new(EventScope::Container, action, id.as_str())
    }

    /// Attach an actor attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.actor.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the event time from unix seconds plus nanoseconds.
    pub fn with_unix_time(mut self, secs: i64, nanos: u32) -> Result<Self, EventError> {
        let time =
            DateTime::<Utc>::from_timestamp(secs, nanos).ok_or(EventError::InvalidTimestamp(secs))?;
        self.time = Some(time);
        Ok(self)
    }

    /// The container this event refers to, if it is container-scoped and the
    /// actor ID is a valid container ID.
    pub fn container_id(&self) -> Option<ContainerId> {
        if self.scope != EventScope::Container {
            return None;
        }
        ContainerId::parse(&self.actor.id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_event_resolves_id() {
        let id = ContainerId::parse("c1").unwrap();
        let event = LifecycleEvent::container(EventAction::Start, &id);
        assert_eq!(event.container_id(), Some(id));
    }

    #[test]
    fn test_non_container_event_has_no_container_id() {
        let event = LifecycleEvent::new(EventScope::Network, EventAction::Start, "net1");
        assert_eq!(event.container_id(), None);
    }

    #[test]
    fn test_image_actor_with_slash_is_not_a_container() {
        let event = LifecycleEvent::new(EventScope::Container, "pull", "library/nginx");
        assert_eq!(event.container_id(), None);
    }

    #[test]
    fn test_unix_time() {
        let event = LifecycleEvent::new("container", "die", "c1")
            .with_unix_time(1_700_000_000, 0)
            .unwrap();
        assert_eq!(event.time.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_json_roundtrip() {
        let event = LifecycleEvent::new("container", "start", "c1").with_attribute("name", "web");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["scope"], "container");
        assert_eq!(json["action"], "start");
        assert_eq!(json["actor"]["attributes"]["name"], "web");

        let parsed: LifecycleEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}

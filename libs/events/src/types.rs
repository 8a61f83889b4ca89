//! Event scope and action vocabularies.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Scope
// =============================================================================

/// Resource type an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventScope {
    Container,
    Image,
    Network,
    Volume,
    Daemon,
    /// Any scope the runtime reports that we do not model.
    Other(String),
}

impl EventScope {
    pub fn as_str(&self) -> &str {
        match self {
            EventScope::Container => "container",
            EventScope::Image => "image",
            EventScope::Network => "network",
            EventScope::Volume => "volume",
            EventScope::Daemon => "daemon",
            EventScope::Other(s) => s,
        }
    }
}

impl From<&str> for EventScope {
    fn from(s: &str) -> Self {
        match s {
            "container" => EventScope::Container,
            "image" => EventScope::Image,
            "network" => EventScope::Network,
            "volume" => EventScope::Volume,
            "daemon" => EventScope::Daemon,
            other => EventScope::Other(other.to_string()),
        }
    }
}

impl From<String> for EventScope {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<EventScope> for String {
    fn from(scope: EventScope) -> Self {
        scope.as_str().to_string()
    }
}

impl fmt::Display for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Action
// =============================================================================

/// What happened to the resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventAction {
    Start,
    Die,
    Restore,
    /// Any other action (`create`, `stop`, `exec_start: sh -c ...`, ...).
    Other(String),
}

impl EventAction {
    pub fn as_str(&self) -> &str {
        match self {
            EventAction::Start => "start",
            EventAction::Die => "die",
            EventAction::Restore => "restore",
            EventAction::Other(s) => s,
        }
    }

    /// Returns true for the actions the reconciler subscribes to.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventAction::Start | EventAction::Die | EventAction::Restore
        )
    }
}

impl From<&str> for EventAction {
    fn from(s: &str) -> Self {
        match s {
            "start" => EventAction::Start,
            "die" => EventAction::Die,
            "restore" => EventAction::Restore,
            other => EventAction::Other(other.to_string()),
        }
    }
}

impl From<String> for EventAction {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<EventAction> for String {
    fn from(action: EventAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

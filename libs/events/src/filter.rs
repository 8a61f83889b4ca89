//! Event selection.

use crate::{EventScope, LifecycleEvent};

/// A stateless predicate over events.
pub trait EventMatcher: Send + Sync {
    /// Returns true if the event should be forwarded.
    fn matches(&self, event: &LifecycleEvent) -> bool;
}

impl<F> EventMatcher for F
where
    F: Fn(&LifecycleEvent) -> bool + Send + Sync,
{
    fn matches(&self, event: &LifecycleEvent) -> bool {
        self(event)
    }
}

/// Passes container events whose action is `start`, `die` or `restore`.
///
/// `restore` is forwarded even though the reconciler has no handler for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleFilter;

impl EventMatcher for LifecycleFilter {
    fn matches(&self, event: &LifecycleEvent) -> bool {
        event.scope == EventScope::Container && event.action.is_lifecycle()
    }
}

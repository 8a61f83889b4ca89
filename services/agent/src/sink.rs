//! Push-based event delivery.

use std::sync::Arc;

use async_trait::async_trait;
use dockwatch_events::{EventMatcher, LifecycleEvent};
use tracing::trace;

use crate::error::SinkError;

/// Consumer side of the event pipeline.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. May wait for the consumer to make room.
    async fn write(&self, event: &LifecycleEvent) -> Result<(), SinkError>;
}

#[async_trait]
impl<S> EventSink for Arc<S>
where
    S: EventSink + ?Sized,
{
    async fn write(&self, event: &LifecycleEvent) -> Result<(), SinkError> {
        (**self).write(event).await
    }
}

/// Forwards only the events accepted by a matcher.
pub struct FilteredSink<S, M> {
    inner: S,
    matcher: M,
}

impl<S, M> FilteredSink<S, M> {
    pub fn new(inner: S, matcher: M) -> Self {
        Self { inner, matcher }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S, M> EventSink for FilteredSink<S, M>
where
    S: EventSink,
    M: EventMatcher,
{
    async fn write(&self, event: &LifecycleEvent) -> Result<(), SinkError> {
        if !self.matcher.matches(event) {
            trace!(
                scope = %event.scope,
                action = %event.action,
                "Event filtered out"
            );
            return Ok(());
        }
        self.inner.write(event).await
    }
}

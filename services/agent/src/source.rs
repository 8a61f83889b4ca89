//! Runtime event source.
//!
//! Pumps the runtime's event stream into a sink, resubscribing whenever the
//! stream fails or ends. Only cancellation or a closed sink stops it.

use dockwatch_events::LifecycleEvent;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::error::{SinkError, SourceError};
use crate::runtime::RuntimeClient;
use crate::sink::EventSink;

/// Forwards runtime events to a sink.
pub struct EventSource<S> {
    sink: S,
    backoff: BackoffPolicy,
}

impl<S: EventSink> EventSource<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Override the delay between resubscription attempts.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until `ctx` is cancelled or the sink closes, and return why it
    /// stopped.
    ///
    /// Stream errors are logged and followed by a resubscription; there is
    /// no retry limit.
    pub async fn run(&self, ctx: &CancellationToken, runtime: &dyn RuntimeClient) -> SourceError {
        let mut attempt: u32 = 0;

        loop {
            if ctx.is_cancelled() {
                return SourceError::Cancelled;
            }

            let mut stream = runtime.events();
            debug!(attempt, "Subscribed to runtime events");

            let failure = loop {
                let item = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return SourceError::Cancelled,
                    item = stream.next() => item,
                };

                match item {
                    Some(Ok(event)) => {
                        if let Err(reason) = self.deliver(ctx, &event).await {
                            return reason;
                        }
                        attempt = 0;
                    }
                    Some(Err(e)) => break e.to_string(),
                    None => break "event stream ended".to_string(),
                }
            };
            drop(stream);

            let delay = self.backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            warn!(
                error = %failure,
                retry_in_ms = delay.as_millis() as u64,
                "Runtime event stream failed, resubscribing"
            );

            tokio::select! {
                biased;
                _ = ctx.cancelled() => return SourceError::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn deliver(
        &self,
        ctx: &CancellationToken,
        event: &LifecycleEvent,
    ) -> Result<(), SourceError> {
        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(SourceError::Cancelled),
            result = self.sink.write(event) => result,
        };

        match result {
            Ok(()) => Ok(()),
            Err(SinkError::Closed) => {
                info!("Event sink closed, stopping event source");
                Err(SourceError::SinkClosed)
            }
            Err(e) => {
                warn!(
                    scope = %event.scope,
                    action = %event.action,
                    actor_id = %event.actor.id,
                    error = %e,
                    "Failed to deliver event"
                );
                Ok(())
            }
        }
    }
}

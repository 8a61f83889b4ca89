//! Pipeline wiring.

use std::sync::Arc;

use dockwatch_events::LifecycleFilter;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::actor::ReconciliationActor;
use crate::backoff::BackoffPolicy;
use crate::error::SourceError;
use crate::runtime::RuntimeClient;
use crate::sink::FilteredSink;
use crate::source::EventSource;

/// Connects the runtime event stream to the reconciliation actor.
///
/// The orchestrator owns the actor's lifetime: when the event source stops,
/// for whatever reason, the actor is closed before `run` returns.
pub struct Orchestrator {
    actor: Arc<ReconciliationActor>,
    runtime: Arc<dyn RuntimeClient>,
    backoff: BackoffPolicy,
}

impl Orchestrator {
    pub fn new(actor: Arc<ReconciliationActor>, runtime: Arc<dyn RuntimeClient>) -> Self {
        Self {
            actor,
            runtime,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Override the resubscription backoff of the event source.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn actor(&self) -> &Arc<ReconciliationActor> {
        &self.actor
    }

    /// Run until `ctx` is cancelled.
    ///
    /// Cancellation is a clean return; any other reason the event source
    /// stopped is logged and returned.
    pub async fn run(&self, ctx: CancellationToken) -> Result<(), SourceError> {
        let sink = FilteredSink::new(Arc::clone(&self.actor), LifecycleFilter);
        let source = EventSource::new(sink).with_backoff(self.backoff.clone());

        info!("Watching runtime events");
        let reason = source.run(&ctx, self.runtime.as_ref()).await;

        self.actor.close().await;

        if reason.is_cancelled() {
            info!("Orchestrator stopped");
            Ok(())
        } else {
            error!(error = %reason, "Event source stopped unexpectedly");
            Err(reason)
        }
    }
}

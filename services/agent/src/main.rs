//! dockwatch
//!
//! Watches the local container runtime and mirrors running containers into
//! a service registry.
//!
//! ## Startup
//!
//! 1. Parse configuration and install logging
//! 2. Connect to the container runtime (fatal on failure)
//! 3. Create the registry backend named by the address (fatal on failure)
//! 4. Spawn the reconciliation actor and run the orchestrator until a
//!    termination signal arrives

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dockwatch_agent::{
    BackendRegistry, Cli, Config, DockerRuntime, Orchestrator, ReconciliationActor,
    RuntimeClient,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_cli(Cli::parse()).context("invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.address,
        mode = %config.naming,
        "Starting dockwatch"
    );

    let runtime = DockerRuntime::connect(config.docker_host.as_deref())
        .context("failed to configure container runtime client")?;
    runtime
        .ping()
        .await
        .context("container runtime is unreachable")?;
    let runtime: Arc<dyn RuntimeClient> = Arc::new(runtime);

    let backends = BackendRegistry::with_builtin();
    let backend = backends
        .create(&config.address, &config.backend_options())
        .with_context(|| format!("failed to create service backend {}", config.address))?;
    backend
        .ping()
        .await
        .with_context(|| format!("service backend {} is unreachable", config.address))?;

    let actor = Arc::new(ReconciliationActor::spawn(
        backend,
        Arc::clone(&runtime),
        config.actor.clone(),
    ));

    let ctx = CancellationToken::new();
    tokio::spawn({
        let ctx = ctx.clone();
        async move {
            let signal = shutdown_signal().await;
            info!(signal, "Received shutdown signal");
            ctx.cancel();
        }
    });

    Orchestrator::new(actor, runtime)
        .run(ctx)
        .await
        .context("event pipeline failed")?;

    info!("dockwatch shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut quit) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(terminate), Ok(quit)) => (terminate, quit),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Failed to install signal handlers, only Ctrl-C is handled");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    "ctrl-c"
}

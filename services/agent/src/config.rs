//! Command line and environment configuration.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::actor::ActorConfig;
use crate::backend::{BackendAddress, BackendError, BackendOptions, NamingMode};

/// Accepted values for `--log-level`.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted for compatibility with logrus-style level names.
const FATAL_LOG_LEVEL: &str = "fatal";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level {0:?}: expected one of trace, debug, info, warn, error, fatal")]
    InvalidLogLevel(String),

    #[error("invalid service backend address: {0}")]
    InvalidAddress(#[source] BackendError),

    #[error("queue capacity {0} is too large for this platform")]
    InvalidQueueCapacity(u64),
}

/// Keeps a service registry in sync with the containers running on a host.
#[derive(Debug, Parser)]
#[command(name = "dockwatch", version, about)]
pub struct Cli {
    /// Service registry address, `<backend>://<connection>`.
    #[arg(env = "DOCKWATCH_ADDRESS", value_name = "ADDRESS")]
    pub address: String,

    /// Docker host: socket path, `unix://`, `tcp://` or `http://` URL.
    #[arg(short = 'H', long, env = "DOCKER_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error). `fatal` is read as
    /// `error`. RUST_LOG takes precedence.
    #[arg(long, env = "DOCKWATCH_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// How containers map to service names.
    #[arg(
        short,
        long,
        env = "DOCKWATCH_MODE",
        value_enum,
        default_value_t = NamingMode::DockerCompose
    )]
    pub mode: NamingMode,

    /// Seconds between full resyncs.
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval: u64,

    /// Upper bound for a single resync, in seconds. 0 disables the limit.
    #[arg(long, default_value_t = 120)]
    pub tick_timeout: u64,

    /// Capacity of the reconciliation queue.
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u64).range(1..))]
    pub queue_capacity: u64,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub address: BackendAddress,
    pub docker_host: Option<String>,
    pub log_level: String,
    pub naming: NamingMode,
    pub actor: ActorConfig,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let mut log_level = cli.log_level.trim().to_ascii_lowercase();
        if log_level == FATAL_LOG_LEVEL {
            log_level = "error".to_string();
        }
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(cli.log_level));
        }

        let address = BackendAddress::parse(&cli.address).map_err(ConfigError::InvalidAddress)?;

        let queue_capacity = usize::try_from(cli.queue_capacity)
            .map_err(|_| ConfigError::InvalidQueueCapacity(cli.queue_capacity))?;

        let tick_timeout = match cli.tick_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let docker_host = cli.host.filter(|h| !h.trim().is_empty());

        Ok(Self {
            address,
            docker_host,
            log_level,
            naming: cli.mode,
            actor: ActorConfig {
                refresh_interval: Duration::from_secs(cli.refresh_interval),
                tick_timeout,
                queue_capacity,
            },
        })
    }

    /// Options for the backend factory.
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            naming: self.naming,
            ..BackendOptions::default()
        }
    }
}

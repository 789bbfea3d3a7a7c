//! Telemetry Monitor
//!
//! Runs either side of a telemetry link for manual testing.
//!
//! Environment variables:
//! - TELEMETRY_MODE: "monitor" (default) or "source"
//! - TELEMETRY_HOST: Source hostname (monitor only, default 127.0.0.1)
//! - TELEMETRY_PORT: Source port (monitor only, default 7711)
//! - TELEMETRY_BIND_ADDR: Bind address (source only, default 0.0.0.0:7711)
//! - TELEMETRY_HEALTH_ADDR: Health server address (default 0.0.0.0:8080)
//! - TELEMETRY_LOG_LEVEL: trace|debug|info|warn|error (falls back to RUST_LOG, then info)

mod health;
mod monitor;
mod source;

use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;

use telemetry_link::client::ClientError;
use telemetry_link::core::constants::DEFAULT_PORT;
use thiserror::Error;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Errors that end the demo.
#[derive(Debug, Error)]
pub enum DemoError {
    /// TELEMETRY_MODE has an unknown value.
    #[error("unknown mode {0:?} (expected \"monitor\" or \"source\")")]
    InvalidMode(String),

    /// An environment variable could not be parsed.
    #[error("invalid {name}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },

    /// Telemetry client error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which side of the link to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Connect to a source and report what arrives.
    Monitor,
    /// Serve synthetic telemetry.
    Source,
}

/// Settings read from the environment.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Which side to run.
    pub mode: Mode,
    /// Source host (monitor mode).
    pub host: String,
    /// Source port (monitor mode).
    pub port: u16,
    /// Listen address (source mode).
    pub bind_addr: SocketAddr,
    /// Health server address.
    pub health_addr: SocketAddr,
    /// Log filter directive.
    pub log_level: String,
}

impl DemoConfig {
    /// Read settings through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DemoError> {
        let mode = match lookup("TELEMETRY_MODE").as_deref() {
            None | Some("monitor") => Mode::Monitor,
            Some("source") => Mode::Source,
            Some(other) => return Err(DemoError::InvalidMode(other.to_string())),
        };

        Ok(Self {
            mode,
            host: lookup("TELEMETRY_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&lookup, "TELEMETRY_PORT", DEFAULT_PORT)?,
            bind_addr: parse_var(
                &lookup,
                "TELEMETRY_BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            )?,
            health_addr: parse_var(&lookup, "TELEMETRY_HEALTH_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            log_level: lookup("TELEMETRY_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, DemoError> {
        Self::from_lookup(|name| env::var(name).ok())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, DemoError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| DemoError::InvalidEnv { name, value }),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match DemoConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("telemetry-monitor: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    let result = match config.mode {
        Mode::Monitor => monitor::run(&config).await,
        Mode::Source => source::run(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "telemetry-monitor failed");
            ExitCode::FAILURE
        }
    }
}

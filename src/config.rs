//! Configuration module for dbprobe.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unlike a best-effort loader, malformed numeric values are reported so the
//! process can refuse to start.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::state::{Credentials, Target};

/// Hard ceiling on how long connecting to (and pinging) one target may take.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_SERVER: &str = "localhost";
const DEFAULT_SERVICE: &str = "postgres";
const DEFAULT_USERNAME: &str = "postgres";
const DEFAULT_PASSWORD: &str = "";
const DEFAULT_PORT: &str = "5432";
const DEFAULT_QUERY: &str = "select employee_name, city from employees";
const DEFAULT_PULL_INTERVAL: &str = "5";
const DEFAULT_LISTEN_SERVER: &str = ":8081";
/// Longest accepted pull interval (one day).
const MAX_PULL_INTERVAL_SECS: u64 = 86_400;

/// Configuration error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid pull interval {0:?}: expected whole seconds between 1 and 86400")]
    InvalidInterval(String),
    #[error("invalid port {0:?}: expected a number between 0 and 65535")]
    InvalidPort(String),
    #[error("no probe targets configured")]
    NoTargets,
}

/// Monitor configuration, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Targets in the order they were listed
    targets: Vec<Target>,
    /// Statement run against every reachable target
    pub query: String,
    /// Time between probe cycles (default: 5s)
    pub pull_interval: Duration,
    /// Listen address for the exposition endpoint (default: "0.0.0.0:8081")
    pub listen_address: String,
    /// Connection timeout applied to every target
    pub connect_timeout: Duration,
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DB_MONITOR_SERVER`: semicolon-separated hosts (default: "localhost")
    /// - `DB_MONITOR_SERVICE`: database/service name (default: "postgres")
    /// - `DB_MONITOR_USERNAME`: user name (default: "postgres")
    /// - `DB_MONITOR_PASSWORD`: password (default: empty)
    /// - `DB_MONITOR_PORT`: port shared by all hosts (default: 5432)
    /// - `DB_MONITOR_QUERY`: probe query
    /// - `DB_MONITOR_PULL_INTERVAL`: seconds between cycles (default: 5)
    /// - `LISTEN_SERVER`: exposition address (default: ":8081")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, fallback: &str| -> String {
            match lookup(key) {
                Some(value) if !value.is_empty() => value,
                _ => fallback.to_string(),
            }
        };

        let interval_str = get("DB_MONITOR_PULL_INTERVAL", DEFAULT_PULL_INTERVAL);
        let pull_interval = match interval_str.trim().parse::<u64>() {
            Ok(secs) if (1..=MAX_PULL_INTERVAL_SECS).contains(&secs) => Duration::from_secs(secs),
            _ => return Err(ConfigError::InvalidInterval(interval_str)),
        };

        let port_str = get("DB_MONITOR_PORT", DEFAULT_PORT);
        let port = port_str
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port_str.clone()))?;

        let credentials = Credentials::new(
            get("DB_MONITOR_SERVICE", DEFAULT_SERVICE),
            get("DB_MONITOR_USERNAME", DEFAULT_USERNAME),
            get("DB_MONITOR_PASSWORD", DEFAULT_PASSWORD),
        );

        let mut targets: Vec<Target> = Vec::new();
        for host in get("DB_MONITOR_SERVER", DEFAULT_SERVER).split(';') {
            let host = host.trim();
            if host.is_empty() || targets.iter().any(|t| t.host == host) {
                continue;
            }
            targets.push(Target::new(host, port, credentials.clone()));
        }
        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        Ok(Self {
            targets,
            query: get("DB_MONITOR_QUERY", DEFAULT_QUERY),
            pull_interval,
            listen_address: normalize_listen_address(&get("LISTEN_SERVER", DEFAULT_LISTEN_SERVER)),
            connect_timeout: CONNECT_TIMEOUT,
        })
    }

    /// Targets to probe, in a stable order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }
}

/// `:8081` means every interface, as in `net/http` style addresses.
fn normalize_listen_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

//! Target and probe result types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Credentials shared by every target.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Service (database) name to connect to
    pub service: String,
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(service: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("service", &self.service)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A monitored database endpoint. Identified by host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
        }
    }
}

/// Reachability of a target as seen by the last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
}

impl Status {
    /// Value of the `db_status` gauge: 0 - up, 1 - down.
    pub fn gauge_value(self) -> f64 {
        match self {
            Status::Up => 0.0,
            Status::Down => 1.0,
        }
    }
}

/// Outcome of a single probe cycle against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub host: String,
    pub status: Status,
    /// Wall-clock time of the whole probe in milliseconds, 0 when down
    pub latency_ms: u64,
    pub observed_at: DateTime<Utc>,
}

impl ProbeResult {
    /// A successful probe that took `elapsed` end to end.
    pub fn up(target: &Target, elapsed: Duration, observed_at: DateTime<Utc>) -> Self {
        Self {
            host: target.host.clone(),
            status: Status::Up,
            latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            observed_at,
        }
    }

    /// A failed probe. A failed connection has no meaningful round trip, so
    /// latency is always reported as zero.
    pub fn down(target: &Target, observed_at: DateTime<Utc>) -> Self {
        Self {
            host: target.host.clone(),
            status: Status::Down,
            latency_ms: 0,
            observed_at,
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == Status::Up
    }
}

//! Probe module for database monitoring.
//!
//! A probe connects to one target, checks that it answers, runs the
//! configured query and reports how long the whole round took.

mod postgres;

pub use postgres::*;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::time::Instant;

use crate::state::{ProbeResult, Target};

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("ping failed: {0}")]
    Ping(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("close failed: {0}")]
    Close(String),
}

/// Opens sessions to database targets.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &Target) -> Result<Box<dyn Session>, ProbeError>;
}

/// An open connection to one target.
#[async_trait]
pub trait Session: Send {
    /// Reachability check.
    async fn ping(&mut self) -> Result<(), ProbeError>;

    /// Run `sql` and consume every row. Returns the number of rows read.
    async fn query(&mut self, sql: &str) -> Result<usize, ProbeError>;

    async fn close(self: Box<Self>) -> Result<(), ProbeError>;
}

/// Runs single probe cycles. Holds no per-target state.
#[derive(Clone)]
pub struct Prober {
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
}

impl Prober {
    pub fn new(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
        }
    }

    /// Probe `target` with `query`.
    ///
    /// Never fails: any error is reported as a down result with zero latency
    /// and recovery is left to the next cycle.
    pub async fn probe(&self, target: &Target, query: &str) -> ProbeResult {
        let observed_at = Utc::now();
        let start = Instant::now();
        let outcome = self.run(target, query).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(rows) => {
                tracing::info!(
                    host = %target.host,
                    port = target.port,
                    rows,
                    latency_ms = elapsed.as_millis() as u64,
                    "Probe succeeded"
                );
                ProbeResult::up(target, elapsed, observed_at)
            }
            Err(e) => {
                tracing::warn!(
                    host = %target.host,
                    port = target.port,
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Probe failed, marking target down"
                );
                ProbeResult::down(target, observed_at)
            }
        }
    }

    async fn run(&self, target: &Target, query: &str) -> Result<usize, ProbeError> {
        let mut session = tokio::time::timeout(self.connect_timeout, self.connector.connect(target))
            .await
            .map_err(|_| ProbeError::Timeout("connect", self.connect_timeout))??;

        let outcome = self.ping_and_query(session.as_mut(), query).await;

        match tokio::time::timeout(self.connect_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(host = %target.host, error = %e, "Can't close connection"),
            Err(_) => tracing::warn!(host = %target.host, "Timed out closing connection"),
        }

        outcome
    }

    async fn ping_and_query(&self, session: &mut dyn Session, query: &str) -> Result<usize, ProbeError> {
        tokio::time::timeout(self.connect_timeout, session.ping())
            .await
            .map_err(|_| ProbeError::Timeout("ping", self.connect_timeout))??;

        // A query that never returns would otherwise stall the whole cycle.
        tokio::time::timeout(self.connect_timeout, session.query(query))
            .await
            .map_err(|_| ProbeError::Timeout("query", self.connect_timeout))?
    }
}

//! PostgreSQL probe implementation.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Row};

use super::{Connector, ProbeError, Session};
use crate::state::Target;

/// Connects to PostgreSQL targets. The target's service name is used as the
/// database name.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresConnector;

impl PostgresConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Connection options for one target.
fn connect_options(target: &Target) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&target.host)
        .port(target.port)
        .database(&target.credentials.service)
        .username(&target.credentials.username)
        .password(target.credentials.password())
        .application_name("dbprobe")
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, target: &Target) -> Result<Box<dyn Session>, ProbeError> {
        tracing::debug!(host = %target.host, port = target.port, "Connecting");

        let conn = PgConnection::connect_with(&connect_options(target))
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        Ok(Box::new(PostgresSession { conn }))
    }
}

struct PostgresSession {
    conn: PgConnection,
}

#[async_trait]
impl Session for PostgresSession {
    async fn ping(&mut self) -> Result<(), ProbeError> {
        self.conn
            .ping()
            .await
            .map_err(|e| ProbeError::Ping(e.to_string()))
    }

    async fn query(&mut self, sql: &str) -> Result<usize, ProbeError> {
        let mut rows = sqlx::query(sql).fetch(&mut self.conn);
        let mut count = 0;

        // Rows are read to completion so a failure part-way through the
        // result set still counts against the target.
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| ProbeError::Query(e.to_string()))?
        {
            let first: String = row
                .try_get(0)
                .map_err(|e| ProbeError::Query(format!("column 0: {}", e)))?;
            let second: String = row
                .try_get(1)
                .map_err(|e| ProbeError::Query(format!("column 1: {}", e)))?;
            tracing::debug!(first = %first, second = %second, "Row");
            count += 1;
        }

        Ok(count)
    }

    async fn close(self: Box<Self>) -> Result<(), ProbeError> {
        self.conn
            .close()
            .await
            .map_err(|e| ProbeError::Close(e.to_string()))
    }
}

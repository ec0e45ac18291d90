//! Redis-backed ledger.
//!
//! Plain `GET task_status_<id>` / `SET task_status_<id> completed` over a
//! multiplexed async connection. The connection is cloned per call, which is
//! how `redis` shares one socket between concurrent executions.

use ::redis::AsyncCommands;
use ::redis::aio::MultiplexedConnection;
use async_trait::async_trait;
use opentelemetry::KeyValue;

use super::{COMPLETED_VALUE, CompletionLedger, is_completed_value, ledger_key};
use crate::error::{Error, Result};
use crate::model::TaskId;
use crate::telemetry::metrics;

#[derive(Clone)]
pub struct RedisLedger {
    conn: MultiplexedConnection,
    key_prefix: Option<String>,
}

impl RedisLedger {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = ::redis::Client::open(url)
            .map_err(|e| Error::Ledger(format!("failed to create Redis client: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Ledger(format!("failed to connect to Redis: {e}")))?;
        Ok(Self::with_connection(conn))
    }

    /// Wrap an existing connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: None,
        }
    }

    /// Namespace keys as `{prefix}:task_status_<id>`. Used for test isolation.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    fn key(&self, id: &TaskId) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{prefix}:{}", ledger_key(id)),
            None => ledger_key(id),
        }
    }
}

fn record_op(operation: &'static str, ok: bool) {
    metrics::ledger_operations().add(
        1,
        &[
            KeyValue::new("operation", operation),
            KeyValue::new("result", if ok { "ok" } else { "error" }),
        ],
    );
}

#[async_trait]
impl CompletionLedger for RedisLedger {
    async fn is_completed(&self, id: &TaskId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.key(id)).await.map_err(|e| {
            record_op("get", false);
            Error::Ledger(format!("GET {} failed: {e}", self.key(id)))
        })?;
        record_op("get", true);
        Ok(is_completed_value(value.as_deref()))
    }

    async fn mark_completed(&self, id: &TaskId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.key(id), COMPLETED_VALUE)
            .await
            .map_err(|e| {
                record_op("set", false);
                Error::Ledger(format!("SET {} failed: {e}", self.key(id)))
            })?;
        record_op("set", true);
        Ok(())
    }
}

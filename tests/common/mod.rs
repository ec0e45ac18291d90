//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tasklane::config::ExecutorSettings;
use tasklane::engine::TaskExecutor;
use tasklane::error::{Error, Result};
use tasklane::external::ExternalService;
use tasklane::ledger::{CompletionLedger, InMemoryLedger};
use tasklane::model::{Task, TaskId};
use tokio::time::Instant;

/// External service that fails a fixed number of times, then succeeds.
/// Every call takes `latency`.
pub struct ScriptedService {
    failures_before_success: u32,
    latency: Duration,
    calls: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedService {
    pub fn succeeding() -> Self {
        Self::failing_times(0)
    }

    pub fn failing_times(n: u32) -> Self {
        Self {
            failures_before_success: n,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_times(u32::MAX)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Gaps between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        let times = self.call_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl ExternalService for ScriptedService {
    async fn call(&self, task: &Task) -> Result<serde_json::Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if n < self.failures_before_success {
            Err(Error::ExternalCall(format!(
                "{}: status 503 Service Unavailable",
                task.id
            )))
        } else {
            Ok(json!({ "result": "ok" }))
        }
    }
}

/// Ledger whose store is unreachable.
pub struct UnavailableLedger;

#[async_trait]
impl CompletionLedger for UnavailableLedger {
    async fn is_completed(&self, _id: &TaskId) -> Result<bool> {
        Err(Error::Ledger("connection refused".to_string()))
    }

    async fn mark_completed(&self, _id: &TaskId) -> Result<()> {
        Err(Error::Ledger("connection refused".to_string()))
    }
}

/// Ledger that reads fine but cannot be written.
#[derive(Default)]
pub struct ReadOnlyLedger {
    inner: InMemoryLedger,
}

#[async_trait]
impl CompletionLedger for ReadOnlyLedger {
    async fn is_completed(&self, id: &TaskId) -> Result<bool> {
        self.inner.is_completed(id).await
    }

    async fn mark_completed(&self, _id: &TaskId) -> Result<()> {
        Err(Error::Ledger("READONLY You can't write against a read only replica".to_string()))
    }
}

pub fn settings(max_retries: u32, base_ms: u64, timeout_ms: u64) -> ExecutorSettings {
    ExecutorSettings {
        max_retries,
        base_backoff_delay: Duration::from_millis(base_ms),
        task_timeout: Duration::from_millis(timeout_ms),
        max_backoff_delay: None,
    }
}

pub fn executor(
    ledger: Arc<dyn CompletionLedger>,
    service: Arc<dyn ExternalService>,
    settings: ExecutorSettings,
) -> TaskExecutor {
    TaskExecutor::new(ledger, service, settings).expect("valid settings")
}

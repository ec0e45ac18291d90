//! Completion ledger: which task ids have reached "completed".
//!
//! The executor checks the ledger before starting a retry sequence and marks
//! it after a successful one. The check is a best-effort dedup, not a lock:
//! two executions of the same id that both read "absent" before either writes
//! will both call the external service. Writes are a single idempotent SET,
//! so concurrent writers can only leave a key absent or "completed".

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryLedger;
pub use self::redis::RedisLedger;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CompletionState, TaskId};

/// Key under which a task's completion is stored.
pub fn ledger_key(id: &TaskId) -> String {
    format!("task_status_{id}")
}

/// Value stored for a completed task.
pub const COMPLETED_VALUE: &str = "completed";

#[async_trait]
pub trait CompletionLedger: Send + Sync {
    /// True once `mark_completed` has succeeded for `id`.
    async fn is_completed(&self, id: &TaskId) -> Result<bool>;

    /// Record `id` as completed. Re-marking is a no-op success.
    async fn mark_completed(&self, id: &TaskId) -> Result<()>;
}

pub(crate) fn is_completed_value(value: Option<&str>) -> bool {
    value == Some(CompletionState::Completed.as_str())
}

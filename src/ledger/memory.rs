//! In-process ledger backed by [`DashMap`].
//!
//! Used by tests and by `serve --in-memory`. Shard-level locking makes
//! `is_completed` and `mark_completed` safe from any number of executions.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CompletionLedger, ledger_key};
use crate::error::Result;
use crate::model::{CompletionRecord, CompletionState, TaskId};

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: DashMap<String, CompletionRecord>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value for `id`, as the key/value store would return it.
    pub fn get(&self, id: &TaskId) -> Option<&'static str> {
        self.records
            .get(&ledger_key(id))
            .map(|record| record.state.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CompletionLedger for InMemoryLedger {
    async fn is_completed(&self, id: &TaskId) -> Result<bool> {
        Ok(self
            .records
            .get(&ledger_key(id))
            .is_some_and(|record| record.state == CompletionState::Completed))
    }

    async fn mark_completed(&self, id: &TaskId) -> Result<()> {
        self.records
            .insert(ledger_key(id), CompletionRecord::completed(id.clone()));
        Ok(())
    }
}

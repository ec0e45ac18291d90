//! Core data model.
//!
//! A task is a unit of work identified by a caller-chosen id. It is routed to
//! one of two classes (short, long) with an advisory priority rank, executed
//! against the external service, and recorded in the completion ledger once it
//! succeeds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Newtype for task ids. Identity, equality and ledger lookups are keyed on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A unit of work. Immutable once dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Arbitrary data for the external service. The core doesn't interpret it.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Task {
    pub fn new(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: TaskId::new(id),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Class + Priority
// ---------------------------------------------------------------------------

/// Timeout tier. Short tasks are deadline-bounded, long tasks are not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    #[default]
    Short,
    Long,
}

impl TaskClass {
    pub const ALL: [TaskClass; 2] = [TaskClass::Short, TaskClass::Long];

    /// Queue channel carrying tasks of this class.
    pub fn queue_name(self) -> &'static str {
        match self {
            TaskClass::Short => "short_tasks",
            TaskClass::Long => "long_tasks",
        }
    }

    pub fn is_deadline_bounded(self) -> bool {
        matches!(self, TaskClass::Short)
    }
}

impl std::fmt::Display for TaskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskClass::Short => "short",
            TaskClass::Long => "long",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(TaskClass::Short),
            "long" => Ok(TaskClass::Long),
            other => Err(Error::Config(format!("unknown task class: {other}"))),
        }
    }
}

/// Advisory rank for the queue. Lower values are served no later than higher ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Default for Priority {
    fn default() -> Self {
        Self(1)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Completion record
// ---------------------------------------------------------------------------

/// The only state the ledger models. Absent means "not completed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Completed,
}

impl CompletionState {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionState::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: TaskId,
    pub state: CompletionState,
}

impl CompletionRecord {
    pub fn completed(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: CompletionState::Completed,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution state machine
// ---------------------------------------------------------------------------

/// Lifecycle of one task-execution instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Start,
    /// Looking the id up in the completion ledger.
    CheckLedger,
    /// Ledger already had the id. Terminal, nothing executed.
    AlreadyDone,
    /// Retry sequence running against the external service.
    Executing,
    /// Succeeded and recorded in the ledger. Terminal.
    Completed,
    /// Retries exhausted, deadline exceeded or ledger unavailable. Terminal.
    Failed,
}

impl ExecutionState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, to),
            (Start, CheckLedger)
                | (CheckLedger, AlreadyDone)
                | (CheckLedger, Executing)
                | (CheckLedger, Failed) // ledger lookup failed
                | (Executing, Completed)
                | (Executing, Failed)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::AlreadyDone | ExecutionState::Completed | ExecutionState::Failed
        )
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionState::Start => "start",
            ExecutionState::CheckLedger => "check_ledger",
            ExecutionState::AlreadyDone => "already_done",
            ExecutionState::Executing => "executing",
            ExecutionState::Completed => "completed",
            ExecutionState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What one execution of a task ended with.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// External call succeeded and the ledger was marked.
    Completed {
        /// Response body of the successful attempt.
        result: serde_json::Value,
        attempts: u32,
        duration_ms: u64,
    },
    /// Ledger showed the id completed before anything ran.
    AlreadyDone,
    /// The task was dropped. Ledger left unmarked, so a resubmission retries.
    Failed {
        error: Error,
        attempts: u32,
        duration_ms: u64,
    },
}

impl ExecutionOutcome {
    /// Terminal state the execution ended in.
    pub fn state(&self) -> ExecutionState {
        match self {
            ExecutionOutcome::Completed { .. } => ExecutionState::Completed,
            ExecutionOutcome::AlreadyDone => ExecutionState::AlreadyDone,
            ExecutionOutcome::Failed { .. } => ExecutionState::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Failed {
                error: Error::Timeout(_),
                ..
            }
        )
    }

    /// Number of external calls made.
    pub fn attempts(&self) -> u32 {
        match self {
            ExecutionOutcome::Completed { attempts, .. }
            | ExecutionOutcome::Failed { attempts, .. } => *attempts,
            ExecutionOutcome::AlreadyDone => 0,
        }
    }
}

/// Notification sent by the worker after each execution finishes.
#[derive(Debug)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub class: TaskClass,
    pub outcome: ExecutionOutcome,
}

pub(crate) fn elapsed_ms(elapsed: Duration) -> u64 {
    elapsed.as_millis() as u64
}

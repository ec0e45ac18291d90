//! Task executor: dedup check, retry sequence, optional deadline, ledger update.
//!
//! Each call to [`TaskExecutor::execute`] drives a single-use [`Execution`]
//! through `Start -> CheckLedger -> {AlreadyDone | Executing -> {Completed | Failed}}`.
//! Short tasks run their whole retry sequence under one deadline; long tasks
//! have none. Failures are logged and dropped: the ledger stays unmarked, so a
//! later resubmission of the same id starts from scratch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use opentelemetry::KeyValue;
use tokio::time::Instant;
use tracing::{Instrument, Span, error, info, warn};

use super::backoff::Backoff;
use super::deadline::with_deadline;
use crate::config::ExecutorSettings;
use crate::error::{Error, Result};
use crate::external::ExternalService;
use crate::ledger::CompletionLedger;
use crate::model::{ExecutionOutcome, ExecutionState, Task, TaskClass, elapsed_ms};
use crate::telemetry::metrics;
use crate::telemetry::task::{record_state_transition, start_task_span};

/// Runs tasks against the external service. Cheap to share behind an `Arc`;
/// executions of different tasks are independent of each other.
pub struct TaskExecutor {
    ledger: Arc<dyn CompletionLedger>,
    service: Arc<dyn ExternalService>,
    settings: ExecutorSettings,
    backoff: Backoff,
}

impl TaskExecutor {
    /// Build an executor, rejecting settings it cannot run with.
    pub fn new(
        ledger: Arc<dyn CompletionLedger>,
        service: Arc<dyn ExternalService>,
        settings: ExecutorSettings,
    ) -> Result<Self> {
        settings.validate()?;

        let mut backoff = Backoff::new(settings.base_backoff_delay);
        if let Some(cap) = settings.max_backoff_delay {
            backoff = backoff.with_max_delay(cap);
        }

        Ok(Self {
            ledger,
            service,
            settings,
            backoff,
        })
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Execute `task` once under the rules of `class`.
    pub async fn execute(&self, task: &Task, class: TaskClass) -> ExecutionOutcome {
        let span = start_task_span(class, &task.id);
        Execution::new(self, task, class, span.clone())
            .run()
            .instrument(span)
            .await
    }
}

/// One task-execution instance. Consumed by [`Execution::run`].
struct Execution<'a> {
    executor: &'a TaskExecutor,
    task: &'a Task,
    class: TaskClass,
    state: ExecutionState,
    span: Span,
    attempts: AtomicU32,
    started: Instant,
}

impl<'a> Execution<'a> {
    fn new(executor: &'a TaskExecutor, task: &'a Task, class: TaskClass, span: Span) -> Self {
        Self {
            executor,
            task,
            class,
            state: ExecutionState::Start,
            span,
            attempts: AtomicU32::new(0),
            started: Instant::now(),
        }
    }

    fn transition(&mut self, to: ExecutionState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        let from = self.state.to_string();
        let to_label = to.to_string();
        record_state_transition(&self.span, &from, &to_label);
        metrics::task_state_transitions().add(
            1,
            &[KeyValue::new("from", from), KeyValue::new("to", to_label)],
        );
        self.state = to;
        Ok(())
    }

    async fn run(mut self) -> ExecutionOutcome {
        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(error) => {
                if let Err(e) = self.transition(ExecutionState::Failed) {
                    warn!(task_id = %self.task.id, "{e}");
                }
                error!(
                    task_id = %self.task.id,
                    class = %self.class,
                    attempts = self.attempts(),
                    %error,
                    "task failed, dropping"
                );
                ExecutionOutcome::Failed {
                    error,
                    attempts: self.attempts(),
                    duration_ms: elapsed_ms(self.started.elapsed()),
                }
            }
        };

        self.record_outcome(&outcome);
        outcome
    }

    async fn drive(&mut self) -> Result<ExecutionOutcome> {
        self.transition(ExecutionState::CheckLedger)?;
        if self.executor.ledger.is_completed(&self.task.id).await? {
            self.transition(ExecutionState::AlreadyDone)?;
            info!(task_id = %self.task.id, "task already completed, skipping");
            return Ok(ExecutionOutcome::AlreadyDone);
        }

        self.transition(ExecutionState::Executing)?;
        let executor = self.executor;
        let sequence = executor
            .backoff
            .execute(executor.settings.max_retries, || self.attempt());

        let result = if self.class.is_deadline_bounded() {
            with_deadline(sequence, executor.settings.task_timeout).await?
        } else {
            sequence.await?
        };

        // Only reached when the sequence finished in time; a fired deadline
        // has already dropped it.
        executor.ledger.mark_completed(&self.task.id).await?;
        self.transition(ExecutionState::Completed)?;

        let attempts = self.attempts();
        let duration_ms = elapsed_ms(self.started.elapsed());
        info!(task_id = %self.task.id, attempts, duration_ms, "task completed successfully");
        Ok(ExecutionOutcome::Completed {
            result,
            attempts,
            duration_ms,
        })
    }

    /// One external call.
    async fn attempt(&self) -> Result<serde_json::Value> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let result = self.executor.service.call(self.task).await;
        metrics::task_attempts().add(
            1,
            &[
                KeyValue::new("class", self.class.to_string()),
                KeyValue::new("result", if result.is_ok() { "ok" } else { "error" }),
            ],
        );
        result
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record_outcome(&self, outcome: &ExecutionOutcome) {
        let class = KeyValue::new("class", self.class.to_string());
        metrics::task_executions().add(
            1,
            &[
                class.clone(),
                KeyValue::new("outcome", outcome.state().to_string()),
            ],
        );
        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        metrics::task_duration_ms().record(duration_ms, &[class]);
    }
}

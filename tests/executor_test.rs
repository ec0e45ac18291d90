//! Task executor scenarios on tokio's paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ReadOnlyLedger, ScriptedService, UnavailableLedger, executor, settings};
use serde_json::json;
use tasklane::config::ExecutorSettings;
use tasklane::engine::TaskExecutor;
use tasklane::error::Error;
use tasklane::ledger::{CompletionLedger, InMemoryLedger};
use tasklane::model::{ExecutionOutcome, ExecutionState, Task, TaskClass};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_then_ledger_is_marked() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::failing_times(2));
    let exec = executor(ledger.clone(), service.clone(), settings(3, 1000, 5000));

    let task = Task::new("t1", json!({}));
    let outcome = exec.execute(&task, TaskClass::Short).await;

    match outcome {
        ExecutionOutcome::Completed {
            result, attempts, ..
        } => {
            assert_eq!(result, json!({ "result": "ok" }));
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(service.calls(), 3);
    assert_eq!(
        service.gaps(),
        vec![Duration::from_millis(1000), Duration::from_millis(2000)]
    );
    assert_eq!(ledger.get(&task.id), Some("completed"));
}

#[tokio::test(start_paused = true)]
async fn completed_id_is_skipped_without_calling_the_service() {
    let ledger = Arc::new(InMemoryLedger::new());
    let task = Task::new("t2", json!({ "n": 1 }));
    ledger.mark_completed(&task.id).await.unwrap();

    let service = Arc::new(ScriptedService::succeeding());
    let exec = executor(ledger.clone(), service.clone(), settings(3, 1000, 5000));

    let outcome = exec.execute(&task, TaskClass::Short).await;

    assert!(matches!(outcome, ExecutionOutcome::AlreadyDone));
    assert_eq!(outcome.state(), ExecutionState::AlreadyDone);
    assert_eq!(outcome.attempts(), 0);
    assert_eq!(service.calls(), 0);
    assert_eq!(ledger.get(&task.id), Some("completed"));
}

#[tokio::test(start_paused = true)]
async fn slow_short_task_times_out_and_is_not_recorded() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::succeeding().with_latency(Duration::from_millis(6000)));
    let exec = executor(ledger.clone(), service.clone(), settings(5, 1000, 5000));

    let task = Task::new("t3", json!({}));
    let start = Instant::now();
    let outcome = exec.execute(&task, TaskClass::Short).await;

    assert!(outcome.is_timeout(), "expected timeout, got {outcome:?}");
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(start.elapsed(), Duration::from_millis(5000));
    assert_eq!(ledger.get(&task.id), None);

    // Nothing lands in the ledger later either.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ledger.get(&task.id), None);
}

#[tokio::test(start_paused = true)]
async fn short_deadline_bounds_the_whole_retry_sequence() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::always_failing());
    let exec = executor(ledger.clone(), service.clone(), settings(5, 1000, 5000));

    let task = Task::new("t4", json!({}));
    let start = Instant::now();
    let outcome = exec.execute(&task, TaskClass::Short).await;

    // Attempts at 0ms, 1000ms and 3000ms; the 4000ms sleep is cut off at 5000ms.
    assert!(outcome.is_timeout(), "expected timeout, got {outcome:?}");
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(service.calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_millis(5000));
    assert!(ledger.is_empty());
}

#[tokio::test(start_paused = true)]
async fn long_task_has_no_deadline() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::succeeding().with_latency(Duration::from_secs(60)));
    let exec = executor(ledger.clone(), service.clone(), settings(5, 1000, 5000));

    let task = Task::new("report-2024", json!({ "kind": "monthly" }));
    let outcome = exec.execute(&task, TaskClass::Long).await;

    assert!(outcome.is_completed(), "expected Completed, got {outcome:?}");
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(ledger.get(&task.id), Some("completed"));
}

#[tokio::test(start_paused = true)]
async fn long_task_retry_sequence_runs_past_the_short_deadline() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::failing_times(4));
    let exec = executor(ledger.clone(), service.clone(), settings(5, 1000, 5000));

    let task = Task::new("long-retry", json!({}));
    let start = Instant::now();
    let outcome = exec.execute(&task, TaskClass::Long).await;

    assert!(outcome.is_completed(), "expected Completed, got {outcome:?}");
    assert_eq!(outcome.attempts(), 5);
    // 1000 + 2000 + 4000 + 8000
    assert_eq!(start.elapsed(), Duration::from_millis(15_000));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_with_the_last_error() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::always_failing());
    let exec = executor(ledger.clone(), service.clone(), settings(3, 100, 60_000));

    let task = Task::new("doomed", json!({}));
    let outcome = exec.execute(&task, TaskClass::Short).await;

    match outcome {
        ExecutionOutcome::Failed {
            error, attempts, ..
        } => {
            assert!(matches!(error, Error::ExternalCall(_)), "got {error:?}");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(service.calls(), 3);
    assert!(ledger.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_task_can_be_executed_again() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::failing_times(2));
    let exec = executor(ledger.clone(), service.clone(), settings(2, 100, 60_000));

    let task = Task::new("second-chance", json!({}));

    let first = exec.execute(&task, TaskClass::Short).await;
    assert_eq!(first.state(), ExecutionState::Failed);
    assert_eq!(ledger.get(&task.id), None);

    let second = exec.execute(&task, TaskClass::Short).await;
    assert!(second.is_completed(), "expected Completed, got {second:?}");
    assert_eq!(service.calls(), 3);
    assert_eq!(ledger.get(&task.id), Some("completed"));

    let third = exec.execute(&task, TaskClass::Short).await;
    assert!(matches!(third, ExecutionOutcome::AlreadyDone));
    assert_eq!(service.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn unreachable_ledger_fails_before_any_call() {
    let service = Arc::new(ScriptedService::succeeding());
    let exec = executor(Arc::new(UnavailableLedger), service.clone(), settings(3, 100, 5000));

    let outcome = exec
        .execute(&Task::new("no-ledger", json!({})), TaskClass::Short)
        .await;

    match outcome {
        ExecutionOutcome::Failed {
            error, attempts, ..
        } => {
            assert!(matches!(error, Error::Ledger(_)), "got {error:?}");
            assert_eq!(attempts, 0);
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(service.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn ledger_write_failure_fails_the_execution() {
    let ledger = Arc::new(ReadOnlyLedger::default());
    let service = Arc::new(ScriptedService::succeeding());
    let exec = executor(ledger.clone(), service.clone(), settings(3, 100, 5000));

    let task = Task::new("unrecorded", json!({}));
    let outcome = exec.execute(&task, TaskClass::Long).await;

    assert_eq!(outcome.state(), ExecutionState::Failed);
    assert_eq!(outcome.attempts(), 1);
    assert!(!ledger.is_completed(&task.id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn concurrent_executions_of_one_id_both_reach_the_service() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::succeeding().with_latency(Duration::from_millis(100)));
    let exec = executor(ledger.clone(), service.clone(), settings(3, 100, 5000));

    let task = Task::new("raced", json!({}));
    let (a, b) = tokio::join!(
        exec.execute(&task, TaskClass::Short),
        exec.execute(&task, TaskClass::Short)
    );

    // Dedup is best-effort: both read "absent" before either wrote.
    assert!(a.is_completed());
    assert!(b.is_completed());
    assert_eq!(service.calls(), 2);
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.get(&task.id), Some("completed"));
}

#[tokio::test(start_paused = true)]
async fn distinct_tasks_execute_independently() {
    let ledger = Arc::new(InMemoryLedger::new());
    let service = Arc::new(ScriptedService::succeeding().with_latency(Duration::from_millis(500)));
    let exec = Arc::new(executor(ledger.clone(), service.clone(), settings(3, 100, 5000)));

    let mut handles = Vec::new();
    for i in 0..10 {
        let exec = Arc::clone(&exec);
        handles.push(tokio::spawn(async move {
            exec.execute(&Task::new(format!("task-{i}"), json!({ "i": i })), TaskClass::Short)
                .await
        }));
    }

    let start = Instant::now();
    for handle in handles {
        assert!(handle.await.unwrap().is_completed());
    }

    // Ran concurrently, not one after another.
    assert!(start.elapsed() < Duration::from_millis(1000));
    assert_eq!(ledger.len(), 10);
}

#[test]
fn executor_rejects_unusable_settings() {
    let build = |settings: ExecutorSettings| {
        TaskExecutor::new(
            Arc::new(InMemoryLedger::new()),
            Arc::new(ScriptedService::succeeding()),
            settings,
        )
    };

    assert!(matches!(build(settings(0, 1000, 5000)), Err(Error::Config(_))));
    assert!(matches!(build(settings(3, 1000, 0)), Err(Error::Config(_))));
    assert!(matches!(
        build(ExecutorSettings {
            max_backoff_delay: Some(Duration::from_millis(10)),
            ..settings(3, 1000, 5000)
        }),
        Err(Error::Config(_))
    ));
    assert!(build(ExecutorSettings::default()).is_ok());
}

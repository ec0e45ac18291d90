//! Metric instrument factories for tasklane.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"tasklane"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for tasklane instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("tasklane")
}

/// Counter: tasks handed to the queue by the dispatcher.
/// Labels: `class`, `result` ("ok" | "error").
pub fn tasks_submitted() -> Counter<u64> {
    meter()
        .u64_counter("tasklane.tasks.submitted")
        .with_description("Number of tasks submitted")
        .build()
}

/// Counter: individual external-call attempts.
/// Labels: `class`, `result` ("ok" | "error").
pub fn task_attempts() -> Counter<u64> {
    meter()
        .u64_counter("tasklane.task.attempts")
        .with_description("Number of external-call attempts")
        .build()
}

/// Counter: finished task executions.
/// Labels: `class`, `outcome` ("completed" | "already_done" | "failed").
pub fn task_executions() -> Counter<u64> {
    meter()
        .u64_counter("tasklane.task.executions")
        .with_description("Number of finished task executions")
        .build()
}

/// Counter: execution state machine transitions.
/// Labels: `from`, `to`.
pub fn task_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("tasklane.task.state_transitions")
        .with_description("Number of task execution state transitions")
        .build()
}

/// Counter: queue-level operations (create, send, read, archive).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("tasklane.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: ledger lookups and writes.
/// Labels: `operation` ("get" | "set"), `result`.
pub fn ledger_operations() -> Counter<u64> {
    meter()
        .u64_counter("tasklane.ledger.operations")
        .with_description("Number of completion ledger operations")
        .build()
}

/// Histogram: wall-clock duration of an execution in milliseconds.
/// Labels: `class`.
pub fn task_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("tasklane.task.duration_ms")
        .with_description("Task execution duration in milliseconds")
        .with_unit("ms")
        .build()
}

//! Task execution span helpers.
//!
//! Provides span creation and state-transition recording for tasks
//! flowing through the executor.

use tracing::Span;

use crate::model::{TaskClass, TaskId};

/// Start a span for one task execution.
///
/// The `task.state` field is declared empty and is filled in by
/// [`record_state_transition`].
pub fn start_task_span(class: TaskClass, task_id: &TaskId) -> Span {
    tracing::info_span!(
        "task.execute",
        "task.class" = %class,
        "task.id" = %task_id,
        "task.state" = tracing::field::Empty,
    )
}

/// Record a state transition on the given span.
///
/// Updates `task.state` and emits a tracing `info` event scoped to the span.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("task.state", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}

//! Dispatcher: the public entry point for submitting tasks.
//!
//! A submission is exactly one enqueue on the channel for the task's class.
//! Nothing runs locally and the caller never waits for the task to execute.
//! Queue failures are returned to the caller unchanged.
//!
//! [`Dispatcher::submit_lines`] feeds a dispatcher from newline-delimited
//! JSON [`Submission`]s, which is how `serve --in-memory` gets its work.

use std::sync::Arc;

use opentelemetry::KeyValue;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{Priority, Task, TaskClass};
use crate::queue::TaskQueue;
use crate::telemetry::metrics;

/// Where and how urgently a task is queued. Defaults: short class, priority 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub priority: Priority,
    pub class: TaskClass,
}

impl DispatchOptions {
    pub fn short() -> Self {
        Self::default()
    }

    pub fn long() -> Self {
        Self {
            class: TaskClass::Long,
            ..Self::default()
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Priority(priority);
        self
    }

    pub fn class(mut self, class: TaskClass) -> Self {
        self.class = class;
        self
    }
}

/// One line of a submission stream:
/// `{"id": "t1", "payload": {...}, "class": "long", "priority": 2}`.
/// `class` and `priority` are optional and take the dispatch defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Submission {
    #[serde(flatten)]
    pub task: Task,
    #[serde(default)]
    pub class: TaskClass,
    #[serde(default)]
    pub priority: Priority,
}

impl Submission {
    pub fn options(&self) -> DispatchOptions {
        DispatchOptions {
            priority: self.priority,
            class: self.class,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<dyn TaskQueue>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    /// Queue `task` on the channel for `options.class` with `options.priority`.
    pub async fn submit(&self, task: &Task, options: DispatchOptions) -> Result<()> {
        let DispatchOptions { priority, class } = options;
        let result = self.queue.enqueue(class, task, priority).await;

        metrics::tasks_submitted().add(
            1,
            &[
                KeyValue::new("class", class.to_string()),
                KeyValue::new("result", if result.is_ok() { "ok" } else { "error" }),
            ],
        );
        result?;

        info!(task_id = %task.id, %class, %priority, queue = class.queue_name(), "task queued");
        Ok(())
    }

    /// Submit every [`Submission`] read from `reader`, one JSON object per
    /// line, until end of input. Blank lines are skipped and malformed lines
    /// are logged and skipped. Returns how many tasks were queued.
    ///
    /// # Errors
    ///
    /// Read failures and queue failures stop the stream and are returned.
    pub async fn submit_lines<R>(&self, reader: R) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut queued = 0;
        let mut line_no = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::Other(format!("reading submissions: {e}")))?
        {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let submission: Submission = match serde_json::from_str(line) {
                Ok(submission) => submission,
                Err(e) => {
                    warn!(line = line_no, "skipping malformed submission: {e}");
                    continue;
                }
            };

            self.submit(&submission.task, submission.options()).await?;
            queued += 1;
        }

        Ok(queued)
    }
}

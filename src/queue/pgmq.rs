//! pgmq-backed task queues, one pgmq queue per [`TaskClass`].
//!
//! Message body: `{"task": {...}, "priority": n}`. pgmq delivers FIFO, so the
//! priority rank travels with the message but does not reorder delivery.
//! A message is archived on ack. While its execution runs the worker renews
//! the visibility timeout every half period; if the worker dies, renewal
//! stops and pgmq hands the message out again once the timeout lapses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Delivery, TaskQueue};
use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::{Priority, Task, TaskClass};

/// Default visibility timeout (seconds) for pgmq reads.
pub const DEFAULT_VISIBILITY_TIMEOUT: i32 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct QueueMessage {
    task: Task,
    #[serde(default)]
    priority: Priority,
}

pub struct PgmqQueue {
    db: Arc<Db>,
    visibility_timeout: i32,
}

impl PgmqQueue {
    pub fn new(db: Arc<Db>) -> Self {
        Self {
            db,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    /// Lease length for read messages, in seconds (at least 1).
    pub fn with_visibility_timeout(mut self, seconds: i32) -> Self {
        self.visibility_timeout = seconds.max(1);
        self
    }

    /// Create the pgmq queues for every class (idempotent).
    pub async fn create_queues(&self) -> Result<()> {
        for class in TaskClass::ALL {
            self.db
                .create_queue(class.queue_name())
                .await
                .map_err(queue_error)?;
        }
        Ok(())
    }
}

fn queue_error(e: Error) -> Error {
    match e {
        Error::Queue(_) => e,
        other => Error::Queue(other.to_string()),
    }
}

#[async_trait]
impl TaskQueue for PgmqQueue {
    async fn enqueue(&self, class: TaskClass, task: &Task, priority: Priority) -> Result<()> {
        let payload = serde_json::to_value(QueueMessage {
            task: task.clone(),
            priority,
        })
        .map_err(|e| Error::Queue(format!("serialize task {}: {e}", task.id)))?;

        let msg_id = self
            .db
            .send_to_queue(class.queue_name(), &payload)
            .await
            .map_err(queue_error)?;
        debug!(task_id = %task.id, %class, msg_id, "task sent to pgmq");
        Ok(())
    }

    async fn next_delivery(&self, class: TaskClass) -> Result<Option<Delivery>> {
        let Some(msg) = self
            .db
            .read_from_queue(class.queue_name(), self.visibility_timeout)
            .await
            .map_err(queue_error)?
        else {
            return Ok(None);
        };

        if msg.read_ct > 1 {
            warn!(msg_id = msg.msg_id, read_ct = msg.read_ct, %class, "redelivered message");
        }
        let queued_ms = (chrono::Utc::now() - msg.enqueued_at).num_milliseconds();
        debug!(msg_id = msg.msg_id, %class, queued_ms, "message read");

        let body: QueueMessage = match serde_json::from_value(msg.message) {
            Ok(body) => body,
            Err(e) => {
                // Unreadable messages would be redelivered forever; archive them.
                warn!(msg_id = msg.msg_id, %class, "bad pgmq payload, archiving: {e}");
                self.db
                    .archive_message(class.queue_name(), msg.msg_id)
                    .await
                    .map_err(queue_error)?;
                return Ok(None);
            }
        };

        Ok(Some(Delivery {
            class,
            task: body.task,
            priority: body.priority,
            receipt: msg.msg_id,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.db
            .archive_message(delivery.class.queue_name(), delivery.receipt)
            .await
            .map_err(queue_error)
    }

    fn heartbeat_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.visibility_timeout as u64 * 500))
    }

    async fn extend_visibility(&self, delivery: &Delivery) -> Result<()> {
        self.db
            .set_visibility_timeout(
                delivery.class.queue_name(),
                delivery.receipt,
                self.visibility_timeout,
            )
            .await
            .map_err(queue_error)
    }
}

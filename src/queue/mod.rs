//! Queue collaborator: durable delivery of tasks to workers.
//!
//! The queue owns persistence and delivery; tasklane owns retries. Each class
//! has its own channel ([`TaskClass::queue_name`]). A delivery is acked once
//! the executor has returned, whatever the outcome, so failures are never
//! re-surfaced to the queue for its own redelivery.
//!
//! Queues that lease deliveries (hand them out again if not acked in time)
//! report a [`TaskQueue::heartbeat_interval`]; the worker then calls
//! [`TaskQueue::extend_visibility`] on that cadence for as long as the
//! execution runs, so a slow task is never delivered a second time.

pub mod memory;
pub mod pgmq;

pub use memory::InMemoryQueue;
pub use pgmq::PgmqQueue;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Priority, Task, TaskClass};

/// A task handed to a worker by the queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub class: TaskClass,
    pub task: Task,
    pub priority: Priority,
    /// Queue-specific handle used to ack this delivery.
    pub receipt: i64,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Place `task` on the channel for `class`.
    async fn enqueue(&self, class: TaskClass, task: &Task, priority: Priority) -> Result<()>;

    /// Take the next task for `class`, if any. Never blocks waiting for work.
    async fn next_delivery(&self, class: TaskClass) -> Result<Option<Delivery>>;

    /// Signal that the handler for `delivery` has finished.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// How often an in-flight delivery must be renewed. `None` if deliveries
    /// are never handed out again while unacked.
    fn heartbeat_interval(&self) -> Option<Duration> {
        None
    }

    /// Keep `delivery` invisible to other readers for another lease period.
    async fn extend_visibility(&self, _delivery: &Delivery) -> Result<()> {
        Ok(())
    }
}

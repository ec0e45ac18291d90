//! In-process queue with per-class priority ordering.
//!
//! Lower priority values are delivered first; equal priorities are FIFO.
//! Each enqueued task is delivered exactly once. Nothing survives a restart.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;

use super::{Delivery, TaskQueue};
use crate::error::{Error, Result};
use crate::model::{Priority, Task, TaskClass};

#[derive(Debug)]
struct Entry {
    priority: Priority,
    seq: i64,
    task: Task,
}

// BinaryHeap is a max-heap: the "greatest" entry is the lowest priority value,
// then the earliest sequence number.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

#[derive(Debug, Default)]
pub struct InMemoryQueue {
    channels: Mutex<HashMap<TaskClass, BinaryHeap<Entry>>>,
    next_seq: AtomicI64,
    acked: AtomicI64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting on the channel for `class`.
    pub fn len(&self, class: TaskClass) -> usize {
        self.lock()
            .map(|channels| channels.get(&class).map_or(0, BinaryHeap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, class: TaskClass) -> bool {
        self.len(class) == 0
    }

    /// Waiting tasks for `class` in delivery order.
    pub fn pending(&self, class: TaskClass) -> Vec<(Task, Priority)> {
        let Ok(channels) = self.lock() else {
            return Vec::new();
        };
        let Some(heap) = channels.get(&class) else {
            return Vec::new();
        };
        let mut entries: Vec<&Entry> = heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
            .into_iter()
            .map(|e| (e.task.clone(), e.priority))
            .collect()
    }

    /// Number of deliveries acked so far.
    pub fn acked(&self) -> i64 {
        self.acked.load(AtomicOrdering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TaskClass, BinaryHeap<Entry>>>> {
        self.channels
            .lock()
            .map_err(|_| Error::Queue("in-memory queue lock poisoned".to_string()))
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(&self, class: TaskClass, task: &Task, priority: Priority) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::SeqCst);
        self.lock()?.entry(class).or_default().push(Entry {
            priority,
            seq,
            task: task.clone(),
        });
        Ok(())
    }

    async fn next_delivery(&self, class: TaskClass) -> Result<Option<Delivery>> {
        let entry = self.lock()?.get_mut(&class).and_then(BinaryHeap::pop);
        Ok(entry.map(|e| Delivery {
            class,
            task: e.task,
            priority: e.priority,
            receipt: e.seq,
        }))
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<()> {
        self.acked.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }
}

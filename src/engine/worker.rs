//! Worker: pulls deliveries from both class channels and runs the executor.
//!
//! One delivery loop per [`TaskClass`]. Each delivery runs on its own tokio
//! task, bounded by `max_concurrent` permits shared by both loops, and is
//! acked once the executor returns. Queues that lease deliveries get their
//! lease renewed on the queue's heartbeat interval while the execution runs.
//! On shutdown the loops stop pulling, give in-flight executions
//! `shutdown_grace` to finish, then abort the rest.
//! An aborted execution has not marked the ledger, so its task stays eligible
//! for resubmission.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::executor::TaskExecutor;
use crate::error::{Error, Result};
use crate::model::{TaskClass, TaskReport};
use crate::queue::{Delivery, TaskQueue};

/// Configuration for the worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Wait between polls when a channel is empty.
    pub poll_interval: Duration,
    /// Maximum executions running at once, across both classes.
    pub max_concurrent: usize,
    /// How long shutdown waits for in-flight executions before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_concurrent: 8,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    executor: Arc<TaskExecutor>,
    config: WorkerConfig,
    shutdown: CancellationToken,
    permits: Arc<Semaphore>,
    reports: Option<mpsc::UnboundedSender<TaskReport>>,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        executor: Arc<TaskExecutor>,
        config: WorkerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            queue,
            executor,
            config,
            shutdown: CancellationToken::new(),
            permits,
            reports: None,
        }
    }

    /// Send a [`TaskReport`] for every finished execution to `reports`.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<TaskReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Signal the worker to shut down.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run both delivery loops until shutdown.
    pub async fn run(&self) -> Result<()> {
        info!(max_concurrent = self.config.max_concurrent, "worker started");

        let (short, long) = tokio::join!(
            self.class_loop(TaskClass::Short),
            self.class_loop(TaskClass::Long)
        );

        info!("worker stopped");
        short.and(long)
    }

    async fn class_loop(&self, class: TaskClass) -> Result<()> {
        let mut in_flight = JoinSet::new();

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!(%class, "task handler panicked: {e}");
                }
            }

            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => permit
                    .map_err(|_| Error::Other("worker semaphore closed".to_string()))?,
            };

            let delivery = match self.queue.next_delivery(class).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    drop(permit);
                    if self.idle().await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    drop(permit);
                    error!(%class, "failed to read from queue: {e}");
                    if self.idle().await {
                        break;
                    }
                    continue;
                }
            };

            in_flight.spawn(run_delivery(
                Arc::clone(&self.queue),
                Arc::clone(&self.executor),
                self.reports.clone(),
                delivery,
                permit,
            ));
        }

        self.drain(class, in_flight).await;
        Ok(())
    }

    /// Sleep one poll interval. Returns true if shutdown was requested meanwhile.
    async fn idle(&self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = tokio::time::sleep(self.config.poll_interval) => false,
        }
    }

    async fn drain(&self, class: TaskClass, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }

        info!(%class, in_flight = in_flight.len(), "waiting for in-flight tasks");
        let drained = tokio::time::timeout(self.config.shutdown_grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                %class,
                remaining = in_flight.len(),
                "shutdown grace elapsed, abandoning in-flight tasks"
            );
            in_flight.abort_all();
            while in_flight.join_next().await.is_some() {}
        }
    }
}

/// Execute one delivery, ack it and report the outcome.
async fn run_delivery(
    queue: Arc<dyn TaskQueue>,
    executor: Arc<TaskExecutor>,
    reports: Option<mpsc::UnboundedSender<TaskReport>>,
    delivery: Delivery,
    _permit: OwnedSemaphorePermit,
) {
    info!(
        task_id = %delivery.task.id,
        class = %delivery.class,
        priority = %delivery.priority,
        "processing task"
    );

    let execution = executor.execute(&delivery.task, delivery.class);
    let outcome = match queue.heartbeat_interval().filter(|d| !d.is_zero()) {
        None => execution.await,
        Some(every) => {
            tokio::pin!(execution);
            let mut heartbeat = tokio::time::interval_at(Instant::now() + every, every);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    outcome = &mut execution => break outcome,
                    _ = heartbeat.tick() => {
                        if let Err(e) = queue.extend_visibility(&delivery).await {
                            warn!(task_id = %delivery.task.id, "failed to extend delivery lease: {e}");
                        }
                    }
                }
            }
        }
    };

    // Acked whatever the outcome: retries already happened in the executor.
    if let Err(e) = queue.ack(&delivery).await {
        error!(task_id = %delivery.task.id, "failed to ack delivery: {e}");
    }

    if let Some(reports) = reports {
        let report = TaskReport {
            task_id: delivery.task.id,
            class: delivery.class,
            outcome,
        };
        if reports.send(report).is_err() {
            debug!("report receiver dropped");
        }
    }
}

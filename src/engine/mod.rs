//! Execution engine: backoff, deadline, task executor and the worker that
//! feeds it from the queue.

pub mod backoff;
pub mod deadline;
pub mod executor;
pub mod worker;

pub use backoff::Backoff;
pub use deadline::with_deadline;
pub use executor::TaskExecutor;
pub use worker::{Worker, WorkerConfig};

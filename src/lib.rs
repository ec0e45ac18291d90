//! # tasklane
//!
//! Two-lane task dispatch over an unreliable external service.
//!
//! Tasks are queued on a short or long channel, executed with bounded
//! retries and exponential backoff, deadline-bounded when short, and
//! recorded in a completion ledger so a completed id is never re-executed.

pub mod config;
pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod external;
pub mod ledger;
pub mod model;
pub mod queue;
pub mod telemetry;

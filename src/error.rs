//! Error types for tasklane.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-success response or transport failure from the external service.
    /// Always retryable.
    #[error("external call failed: {0}")]
    ExternalCall(String),

    #[error("task timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

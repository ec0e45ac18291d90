//! Wall-clock deadline around an operation.
//!
//! Races the operation against a timer. If the timer wins, the operation's
//! future is dropped on the spot: any pending backoff sleep or HTTP request
//! inside it is cancelled, and nothing it would have done afterwards runs.
//! Whatever the caller does on success (marking the ledger) therefore can
//! never happen after the deadline fired.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Run `operation`, failing with [`Error::Timeout`] if it takes longer than
/// `duration`. An outcome produced in time is returned verbatim.
pub async fn with_deadline<T, F>(operation: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => {
            warn!(
                timeout_ms = duration.as_millis() as u64,
                "deadline exceeded, operation cancelled"
            );
            Err(Error::Timeout(duration))
        }
    }
}

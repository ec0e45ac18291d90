//! The unreliable external service tasks are executed against.
//!
//! One call is one request/response. Every failure, whatever its cause, is
//! reported as [`Error::ExternalCall`](crate::error::Error::ExternalCall) and
//! retried the same way by the executor.

pub mod http;

pub use http::HttpService;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Task;

#[async_trait]
pub trait ExternalService: Send + Sync {
    /// Process `task` once, returning the service's response body.
    async fn call(&self, task: &Task) -> Result<serde_json::Value>;
}

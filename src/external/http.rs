//! HTTP adapter: `POST {base_url}/process-task/{id}` with the task as JSON.

use async_trait::async_trait;
use tracing::debug;

use super::ExternalService;
use crate::error::{Error, Result};
use crate::model::Task;

#[derive(Debug, Clone)]
pub struct HttpService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Use a pre-configured client (timeouts, proxies, TLS).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Endpoint for a single task.
    pub fn task_url(&self, task: &Task) -> String {
        format!("{}/process-task/{}", self.base_url, task.id)
    }
}

#[async_trait]
impl ExternalService for HttpService {
    async fn call(&self, task: &Task) -> Result<serde_json::Value> {
        let url = self.task_url(task);
        let response = self
            .client
            .post(&url)
            .json(task)
            .send()
            .await
            .map_err(|e| Error::ExternalCall(format!("POST {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ExternalCall(format!("POST {url}: status {status}")));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::ExternalCall(format!("POST {url}: bad response body: {e}")))?;
        debug!(task_id = %task.id, %status, "external call succeeded");
        Ok(body)
    }
}

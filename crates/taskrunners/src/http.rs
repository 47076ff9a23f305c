use crate::{optional_string_argument, string_argument};
use async_trait::async_trait;
use taskcore::{DispatchRequest, ExecutionStatus, RunnerError, TaskRunner};
use taskruntime::{ArgumentDefinition, RunnerFactory, RunnerMetadata};

/// Runner that hands a task to an external HTTP service.
///
/// `execute` POSTs the dispatch request to `url`. The service reports back
/// through a completion message, and `get_status` then asks
/// `status_url/<identity>` for an [`ExecutionStatus`] document.
pub struct HttpRunner {
    client: reqwest::Client,
    url: String,
    status_url: String,
    request: DispatchRequest,
}

impl HttpRunner {
    pub fn from_request(request: &DispatchRequest) -> Result<Self, RunnerError> {
        let url = string_argument(request, "url")?;
        let status_url = optional_string_argument(request, "status_url").unwrap_or_else(|| url.clone());

        Ok(Self {
            client: reqwest::Client::new(),
            url,
            status_url: status_url.trim_end_matches('/').to_string(),
            request: request.clone(),
        })
    }
}

#[async_trait]
impl TaskRunner for HttpRunner {
    fn runner_type(&self) -> &str {
        "http"
    }

    async fn execute(&self) -> Result<ExecutionStatus, RunnerError> {
        tracing::info!("POST {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&self.request)
            .send()
            .await
            .map_err(|e| RunnerError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        tracing::info!("Response status: {}", status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RunnerError::ExecutionFailed(format!(
                "service rejected the task with {}: {}",
                status, body
            )));
        }

        Ok(ExecutionStatus::accepted())
    }

    async fn get_status(&self, identity: &str) -> Result<ExecutionStatus, RunnerError> {
        let url = format!("{}/{}", self.status_url, identity);
        tracing::info!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RunnerError::StatusFailed(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RunnerError::StatusFailed(format!(
                "status endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<ExecutionStatus>()
            .await
            .map_err(|e| RunnerError::StatusFailed(format!("Failed to read response: {}", e)))
    }
}

pub struct HttpRunnerFactory;

impl RunnerFactory for HttpRunnerFactory {
    fn create(&self, request: &DispatchRequest) -> Result<Box<dyn TaskRunner>, RunnerError> {
        Ok(Box::new(HttpRunner::from_request(request)?))
    }

    fn runner_type(&self) -> &str {
        "http"
    }

    fn metadata(&self) -> RunnerMetadata {
        RunnerMetadata {
            description: "Hand the task to an HTTP service".to_string(),
            category: "http".to_string(),
            arguments: vec![
                ArgumentDefinition {
                    name: "url".to_string(),
                    description: "Endpoint the dispatch request is POSTed to".to_string(),
                    required: true,
                },
                ArgumentDefinition {
                    name: "status_url".to_string(),
                    description: "Base URL for status queries, defaults to url".to_string(),
                    required: false,
                },
            ],
        }
    }
}

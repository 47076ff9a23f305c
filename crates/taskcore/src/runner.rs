use crate::{ExecutionStatus, RunnerError};
use async_trait::async_trait;

/// Core trait that all execution backends implement.
///
/// A runner is created for one dispatch request and lives until the
/// completion for that execution has been handled.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Type identifier the runner was registered under (e.g. "docker", "http")
    fn runner_type(&self) -> &str;

    /// Start the execution. Returning `Accepted` means the backend will report
    /// completion later through a callback message.
    async fn execute(&self) -> Result<ExecutionStatus, RunnerError>;

    /// Query the backend for the current status of the execution
    async fn get_status(&self, identity: &str) -> Result<ExecutionStatus, RunnerError>;
}

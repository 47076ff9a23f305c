use async_trait::async_trait;
use taskcore::{DispatchRequest, ExecutionStatus, RunnerError, TaskRunner};
use taskruntime::{RunnerFactory, RunnerMetadata};

/// Runner that finishes as soon as it is dispatched
pub struct NoopRunner {
    execution_id: String,
}

#[async_trait]
impl TaskRunner for NoopRunner {
    fn runner_type(&self) -> &str {
        "noop"
    }

    async fn execute(&self) -> Result<ExecutionStatus, RunnerError> {
        tracing::info!("Execution {} has nothing to do", self.execution_id);
        Ok(ExecutionStatus::succeeded())
    }

    async fn get_status(&self, _identity: &str) -> Result<ExecutionStatus, RunnerError> {
        Ok(ExecutionStatus::succeeded())
    }
}

pub struct NoopRunnerFactory;

impl RunnerFactory for NoopRunnerFactory {
    fn create(&self, request: &DispatchRequest) -> Result<Box<dyn TaskRunner>, RunnerError> {
        Ok(Box::new(NoopRunner {
            execution_id: request.execution_id.clone(),
        }))
    }

    fn runner_type(&self) -> &str {
        "noop"
    }

    fn metadata(&self) -> RunnerMetadata {
        RunnerMetadata {
            description: "Completes immediately without doing any work".to_string(),
            category: "debug".to_string(),
            arguments: vec![],
        }
    }
}

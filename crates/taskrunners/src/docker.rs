use crate::{optional_string_argument, string_argument};
use async_trait::async_trait;
use taskcore::{DispatchRequest, ExecutionStatus, FailureReason, RunnerError, TaskRunner, Value};
use taskruntime::{ArgumentDefinition, RunnerFactory, RunnerMetadata};
use tokio::process::Command;
use tokio::sync::Mutex;

const INSPECT_FORMAT: &str = "{{.State.Status}} {{.State.ExitCode}}";

/// Runner that starts a detached Docker container per task.
///
/// The container is labelled with the workflow, task and correlation ids so
/// the callback that reports its completion can be traced back to the task.
/// `get_status` inspects the container named by the completion identity, or
/// the one this runner started when the identity is empty.
pub struct DockerRunner {
    image: String,
    command: Option<String>,
    env: Vec<String>,
    labels: Vec<(String, String)>,
    container_id: Mutex<Option<String>>,
}

impl DockerRunner {
    pub fn from_request(request: &DispatchRequest) -> Result<Self, RunnerError> {
        let image = string_argument(request, "image")?;
        let command = optional_string_argument(request, "command");

        let mut env = Vec::new();
        if let Some(Value::Object(vars)) = request.arguments.get("env") {
            for (key, value) in vars {
                if let Some(val_str) = value.as_str() {
                    env.push(format!("{}={}", key, val_str));
                }
            }
        }
        env.sort();

        let labels = vec![
            ("md-workflow-id".to_string(), request.workflow_instance_id.clone()),
            ("md-task-id".to_string(), request.task_id.clone()),
            ("md-execution-id".to_string(), request.execution_id.clone()),
            ("md-correlation-id".to_string(), request.correlation_id.clone()),
        ];

        Ok(Self {
            image,
            command,
            env,
            labels,
            container_id: Mutex::new(None),
        })
    }

    /// Id of the container started by `execute`, if any
    pub async fn container_id(&self) -> Option<String> {
        self.container_id.lock().await.clone()
    }

    fn run_command(&self) -> Command {
        let mut cmd = Command::new("docker");
        cmd.arg("run").arg("-d");

        for (key, value) in &self.labels {
            cmd.arg("--label").arg(format!("{}={}", key, value));
        }
        for env in &self.env {
            cmd.arg("-e").arg(env);
        }

        cmd.arg(&self.image);

        if let Some(cmd_str) = &self.command {
            for part in cmd_str.split_whitespace() {
                cmd.arg(part);
            }
        }
        cmd
    }
}

#[async_trait]
impl TaskRunner for DockerRunner {
    fn runner_type(&self) -> &str {
        "docker"
    }

    async fn execute(&self) -> Result<ExecutionStatus, RunnerError> {
        tracing::info!("Running Docker image: {}", self.image);

        let output = self
            .run_command()
            .output()
            .await
            .map_err(|e| RunnerError::ExecutionFailed(format!("Failed to spawn docker: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunnerError::ExecutionFailed(format!(
                "docker run exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if container_id.is_empty() {
            return Err(RunnerError::ExecutionFailed(
                "docker run did not report a container id".to_string(),
            ));
        }

        tracing::info!("Started container {}", container_id);
        *self.container_id.lock().await = Some(container_id);
        Ok(ExecutionStatus::accepted())
    }

    async fn get_status(&self, identity: &str) -> Result<ExecutionStatus, RunnerError> {
        let container = if identity.trim().is_empty() {
            self.container_id()
                .await
                .ok_or_else(|| RunnerError::StatusFailed("no container to inspect".to_string()))?
        } else {
            identity.trim().to_string()
        };

        let output = Command::new("docker")
            .arg("inspect")
            .arg("--format")
            .arg(INSPECT_FORMAT)
            .arg(&container)
            .output()
            .await
            .map_err(|e| RunnerError::StatusFailed(format!("Failed to spawn docker: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("Container {} could not be inspected: {}", container, stderr.trim());
            return Ok(ExecutionStatus::failed(
                FailureReason::RunnerError,
                format!("container {} not found", container),
            ));
        }

        Ok(status_from_inspect(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Map `docker inspect` state output onto an execution status
fn status_from_inspect(output: &str) -> ExecutionStatus {
    let mut parts = output.split_whitespace();
    let state = parts.next().unwrap_or_default();
    let exit_code: i64 = parts.next().and_then(|c| c.parse().ok()).unwrap_or(-1);

    match state {
        "created" | "running" | "restarting" | "paused" => ExecutionStatus::accepted(),
        "exited" if exit_code == 0 => ExecutionStatus::succeeded(),
        "exited" => ExecutionStatus::failed(
            FailureReason::RunnerError,
            format!("container exited with code {}", exit_code),
        ),
        other => ExecutionStatus::failed(
            FailureReason::RunnerError,
            format!("container is {}", if other.is_empty() { "in an unknown state" } else { other }),
        ),
    }
}

pub struct DockerRunnerFactory;

impl RunnerFactory for DockerRunnerFactory {
    fn create(&self, request: &DispatchRequest) -> Result<Box<dyn TaskRunner>, RunnerError> {
        Ok(Box::new(DockerRunner::from_request(request)?))
    }

    fn runner_type(&self) -> &str {
        "docker"
    }

    fn metadata(&self) -> RunnerMetadata {
        RunnerMetadata {
            description: "Run a task as a detached Docker container".to_string(),
            category: "docker".to_string(),
            arguments: vec![
                ArgumentDefinition {
                    name: "image".to_string(),
                    description: "Image to run".to_string(),
                    required: true,
                },
                ArgumentDefinition {
                    name: "command".to_string(),
                    description: "Command override, split on whitespace".to_string(),
                    required: false,
                },
                ArgumentDefinition {
                    name: "env".to_string(),
                    description: "Environment variables as an object of strings".to_string(),
                    required: false,
                },
            ],
        }
    }
}

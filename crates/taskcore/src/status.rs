use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code reported for a task execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Accepted,
    Succeeded,
    Failed,
    Canceled,
    PartialFail,
}

impl TaskStatus {
    /// Every status except `Accepted` is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Accepted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Accepted => "Accepted",
            TaskStatus::Succeeded => "Succeeded",
            TaskStatus::Failed => "Failed",
            TaskStatus::Canceled => "Canceled",
            TaskStatus::PartialFail => "PartialFail",
        };
        f.write_str(s)
    }
}

/// Why an execution failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FailureReason {
    #[default]
    None,
    InvalidMessage,
    UnsupportedRunner,
    RunnerError,
    ExternalServiceError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::None => "none",
            FailureReason::InvalidMessage => "invalid message",
            FailureReason::UnsupportedRunner => "unsupported runner",
            FailureReason::RunnerError => "runner error",
            FailureReason::ExternalServiceError => "external service error",
        };
        f.write_str(s)
    }
}

/// Outcome of a runner invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: TaskStatus,
    #[serde(default)]
    pub failure_reason: FailureReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

impl ExecutionStatus {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            failure_reason: FailureReason::None,
            errors: None,
        }
    }

    pub fn accepted() -> Self {
        Self::new(TaskStatus::Accepted)
    }

    pub fn succeeded() -> Self {
        Self::new(TaskStatus::Succeeded)
    }

    pub fn failed(reason: FailureReason, errors: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            failure_reason: reason,
            errors: Some(errors.into()),
        }
    }
}

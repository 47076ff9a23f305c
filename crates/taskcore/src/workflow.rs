use crate::{TaskStatus, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata captured when a task execution completes
pub type TaskMetadata = HashMap<String, Value>;

/// One running occurrence of a workflow over a payload.
///
/// The orchestrator only reads instances; persisting and advancing them is the
/// job of the workflow executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: String,
    pub workflow_id: String,
    pub payload_id: String,
    pub bucket_id: String,
    #[serde(default)]
    pub tasks: Vec<TaskExecution>,
}

impl WorkflowInstance {
    pub fn new(workflow_id: impl Into<String>, payload_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            payload_id: payload_id.into(),
            bucket_id: String::new(),
            tasks: Vec::new(),
        }
    }

    pub fn with_bucket(mut self, bucket_id: impl Into<String>) -> Self {
        self.bucket_id = bucket_id.into();
        self
    }

    pub fn with_task(mut self, task: TaskExecution) -> Self {
        self.tasks.push(task);
        self
    }

    /// First task execution with the given task id
    pub fn find_task(&self, task_id: &str) -> Option<&TaskExecution> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }
}

/// A node instance within a workflow instance's task graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecution {
    pub execution_id: String,
    pub task_id: String,
    #[serde(default)]
    pub task_type: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

impl TaskExecution {
    pub fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            execution_id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            task_type: String::new(),
            status,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

use crate::{ExecutionStatus, FailureReason, MessageError, TaskStatus, Value};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Discriminator carried by task dispatch messages
pub const TASK_DISPATCH_MESSAGE_TYPE: &str = "md.tasks.dispatch";

/// Discriminator carried by runner completion callbacks
pub const TASK_CALLBACK_MESSAGE_TYPE: &str = "md.tasks.callback";

/// Topic every status update is published to
pub const TASK_UPDATE_TOPIC: &str = "md.tasks.update";

/// Transport envelope shared by inbound and outbound messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub correlation_id: String,
    pub message_type: String,
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub delivery_tag: String,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    pub body: serde_json::Value,
}

impl Message {
    pub fn new(
        message_type: impl Into<String>,
        correlation_id: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        let message_id = Uuid::new_v4().to_string();
        Self {
            delivery_tag: message_id.clone(),
            message_id,
            correlation_id: correlation_id.into(),
            message_type: message_type.into(),
            application_id: String::new(),
            created: Utc::now(),
            body,
        }
    }

    /// Build a message from any serializable body
    pub fn from_body<T: Serialize>(
        message_type: impl Into<String>,
        correlation_id: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(message_type, correlation_id, serde_json::to_value(body)?))
    }

    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = application_id.into();
        self
    }

    /// Which inbound shape this message carries, if any
    pub fn kind(&self) -> Option<InboundMessage> {
        match self.message_type.as_str() {
            TASK_DISPATCH_MESSAGE_TYPE => Some(InboundMessage::Dispatch),
            TASK_CALLBACK_MESSAGE_TYPE => Some(InboundMessage::Completion),
            _ => None,
        }
    }

    /// Deserialize the body into a typed payload
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        serde_json::from_value(self.body.clone()).map_err(|e| MessageError::Malformed(e.to_string()))
    }

    /// Read a string field from the raw body without requiring the body to be valid
    pub fn body_field(&self, field: &str) -> String {
        self.body
            .get(field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// The two message shapes the task manager consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    Dispatch,
    Completion,
}

/// Instruction to begin executing a task execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchRequest {
    pub workflow_instance_id: String,
    pub task_id: String,
    pub execution_id: String,
    pub correlation_id: String,
    pub runner_type: String,
    #[serde(default)]
    pub payload_id: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl DispatchRequest {
    pub fn new(
        workflow_instance_id: impl Into<String>,
        task_id: impl Into<String>,
        runner_type: impl Into<String>,
    ) -> Self {
        Self {
            workflow_instance_id: workflow_instance_id.into(),
            task_id: task_id.into(),
            execution_id: Uuid::new_v4().to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            runner_type: runner_type.into(),
            payload_id: String::new(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Get required argument or return error
    pub fn require_argument(&self, name: &str) -> Result<&Value, MessageError> {
        self.arguments
            .get(name)
            .ok_or_else(|| MessageError::MissingField(format!("arguments.{}", name)))
    }

    pub fn validate(&self) -> Result<(), MessageError> {
        require_non_empty("workflow_instance_id", &self.workflow_instance_id)?;
        require_non_empty("task_id", &self.task_id)?;
        require_non_empty("execution_id", &self.execution_id)?;
        require_non_empty("correlation_id", &self.correlation_id)?;
        require_non_empty("runner_type", &self.runner_type)?;
        Ok(())
    }

    /// Parse and validate a dispatch request out of a transport message
    pub fn from_message(message: &Message) -> Result<Self, MessageError> {
        let request: Self = message.body_as()?;
        request.validate()?;
        Ok(request)
    }

    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        Message::from_body(TASK_DISPATCH_MESSAGE_TYPE, self.correlation_id.clone(), self)
    }
}

/// Signal that a runner backend finished (or checkpointed) an execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionNotification {
    pub workflow_instance_id: String,
    pub task_id: String,
    pub execution_id: String,
    pub correlation_id: String,
    pub identity: String,
}

impl CompletionNotification {
    pub fn for_request(request: &DispatchRequest, identity: impl Into<String>) -> Self {
        Self {
            workflow_instance_id: request.workflow_instance_id.clone(),
            task_id: request.task_id.clone(),
            execution_id: request.execution_id.clone(),
            correlation_id: request.correlation_id.clone(),
            identity: identity.into(),
        }
    }

    pub fn validate(&self) -> Result<(), MessageError> {
        require_non_empty("workflow_instance_id", &self.workflow_instance_id)?;
        require_non_empty("task_id", &self.task_id)?;
        require_non_empty("execution_id", &self.execution_id)?;
        require_non_empty("correlation_id", &self.correlation_id)?;
        require_non_empty("identity", &self.identity)?;
        Ok(())
    }

    pub fn from_message(message: &Message) -> Result<Self, MessageError> {
        let notification: Self = message.body_as()?;
        notification.validate()?;
        Ok(notification)
    }

    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        Message::from_body(TASK_CALLBACK_MESSAGE_TYPE, self.correlation_id.clone(), self)
    }
}

/// Outbound status transition for one execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub workflow_instance_id: String,
    pub task_id: String,
    pub execution_id: String,
    pub correlation_id: String,
    pub status: TaskStatus,
    pub reason: FailureReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusUpdate {
    pub fn new(
        workflow_instance_id: impl Into<String>,
        task_id: impl Into<String>,
        execution_id: impl Into<String>,
        correlation_id: impl Into<String>,
        status: &ExecutionStatus,
    ) -> Self {
        Self {
            workflow_instance_id: workflow_instance_id.into(),
            task_id: task_id.into(),
            execution_id: execution_id.into(),
            correlation_id: correlation_id.into(),
            status: status.status,
            reason: status.failure_reason,
            message: status.errors.clone(),
        }
    }

    /// Failed update built from whatever identifiers a raw message carries
    pub fn failed_from_raw(message: &Message, reason: FailureReason, errors: impl Into<String>) -> Self {
        let status = ExecutionStatus::failed(reason, errors);
        Self::new(
            message.body_field("workflow_instance_id"),
            message.body_field("task_id"),
            message.body_field("execution_id"),
            message.correlation_id.clone(),
            &status,
        )
    }

    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        Message::from_body(TASK_UPDATE_TOPIC, self.correlation_id.clone(), self)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), MessageError> {
    if value.trim().is_empty() {
        return Err(MessageError::MissingField(field.to_string()));
    }
    Ok(())
}

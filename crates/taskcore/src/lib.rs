//! Core abstractions for the task orchestrator
//!
//! This crate provides the message shapes, status types, runner contract and
//! transport contract that the dispatcher, the condition resolver and the
//! runner plugins all share.

mod error;
pub mod events;
mod messages;
mod runner;
mod status;
mod value;
mod workflow;

pub use error::{BrokerError, MessageError, RunnerError};
pub use messages::{
    CompletionNotification, DispatchRequest, InboundMessage, Message, StatusUpdate,
    TASK_CALLBACK_MESSAGE_TYPE, TASK_DISPATCH_MESSAGE_TYPE, TASK_UPDATE_TOPIC,
};
pub use runner::TaskRunner;
pub use status::{ExecutionStatus, FailureReason, TaskStatus};
pub use value::Value;
pub use workflow::{TaskExecution, TaskMetadata, WorkflowInstance};
pub use events::*;

use thiserror::Error;

/// Raised when an inbound message body cannot be trusted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessageError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Malformed message body: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Status query failed: {0}")]
    StatusFailed(String),
}

#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("Failed to connect to broker: {0}")]
    ConnectionFailed(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(String),

    #[error("Failed to publish message: {0}")]
    PublishFailed(String),

    #[error("Stream or topic not found")]
    NotFound,
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Malformed expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },

    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Cannot evaluate: {0}")]
    Evaluation(String),

    #[error("Series attribute lookup failed: {0}")]
    Lookup(String),

    #[error("Runtime unavailable: {0}")]
    Runtime(String),
}

impl ConditionError {
    pub(crate) fn malformed(expression: &str, reason: impl Into<String>) -> Self {
        Self::MalformedExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

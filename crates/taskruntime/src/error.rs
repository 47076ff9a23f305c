use taskcore::RunnerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown runner type: {0}")]
    UnknownRunnerType(String),

    #[error("Failed to create runner '{runner_type}': {source}")]
    CreationFailed {
        runner_type: String,
        #[source]
        source: RunnerError,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use taskcore::TASK_UPDATE_TOPIC;

/// Configuration for the task manager.
///
/// Keys are camelCase so the `taskManager` section of an existing deployment
/// file can be used as is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerConfig {
    /// Upper bound on executions in flight at once
    pub max_concurrent_jobs: usize,

    /// Topic status updates are published to
    pub task_update_topic: String,

    /// Application id stamped on outbound messages
    pub application_id: String,

    /// Selector -> runner type aliases
    pub plugins: HashMap<String, String>,

    /// Broker-side prefetch hint. Reported only, admission is bounded by
    /// `max_concurrent_jobs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 10,
            task_update_topic: TASK_UPDATE_TOPIC.to_string(),
            application_id: "taskflow".to_string(),
            plugins: HashMap::new(),
            queue_capacity: None,
        }
    }
}

impl ManagerConfig {
    pub fn with_max_concurrent_jobs(mut self, max_concurrent_jobs: usize) -> Self {
        self.max_concurrent_jobs = max_concurrent_jobs;
        self
    }

    pub fn with_plugin(mut self, selector: impl Into<String>, runner_type: impl Into<String>) -> Self {
        self.plugins.insert(selector.into(), runner_type.into());
        self
    }

    /// Load from a JSON file and validate
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "maxConcurrentJobs must be at least 1".to_string(),
            ));
        }
        if self.task_update_topic.trim().is_empty() {
            return Err(ConfigError::Invalid("taskUpdateTopic must not be empty".to_string()));
        }
        for (selector, runner_type) in &self.plugins {
            if selector.trim().is_empty() || runner_type.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "plugin mapping '{}' -> '{}' is incomplete",
                    selector, runner_type
                )));
            }
        }
        Ok(())
    }
}

use crate::RegistryError;
use std::collections::HashMap;
use std::sync::Arc;
use taskcore::{DispatchRequest, RunnerError, TaskRunner};

/// Factory trait for creating runner instances
pub trait RunnerFactory: Send + Sync {
    /// Create a runner bound to one dispatch request
    fn create(&self, request: &DispatchRequest) -> Result<Box<dyn TaskRunner>, RunnerError>;

    /// Get runner type identifier
    fn runner_type(&self) -> &str;

    /// Optional: describe the runner and the arguments it reads
    fn metadata(&self) -> RunnerMetadata {
        RunnerMetadata::default()
    }
}

/// Metadata about a runner type
#[derive(Debug, Clone)]
pub struct RunnerMetadata {
    pub description: String,
    pub category: String,
    pub arguments: Vec<ArgumentDefinition>,
}

impl Default for RunnerMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            arguments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Registry of available runner types.
///
/// Selectors carried on dispatch requests are resolved through the alias table
/// first (so deployments can map e.g. `argo` onto a concrete runner), then
/// looked up among the registered factories.
pub struct RunnerRegistry {
    factories: HashMap<String, Arc<dyn RunnerFactory>>,
    aliases: HashMap<String, String>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Register a runner factory
    pub fn register(&mut self, factory: Arc<dyn RunnerFactory>) {
        let runner_type = factory.runner_type().to_string();
        tracing::info!("Registering runner type: {}", runner_type);
        self.factories.insert(runner_type, factory);
    }

    /// Map a selector onto a registered runner type
    pub fn register_alias(&mut self, selector: impl Into<String>, runner_type: impl Into<String>) {
        let selector = selector.into();
        let runner_type = runner_type.into();
        tracing::info!("Registering runner alias: {} -> {}", selector, runner_type);
        self.aliases.insert(selector, runner_type);
    }

    pub fn with_aliases(mut self, aliases: &HashMap<String, String>) -> Self {
        for (selector, runner_type) in aliases {
            self.register_alias(selector.clone(), runner_type.clone());
        }
        self
    }

    /// Runner type a selector resolves to
    pub fn resolve_selector<'a>(&'a self, selector: &'a str) -> &'a str {
        self.aliases.get(selector).map(String::as_str).unwrap_or(selector)
    }

    /// Create a runner for the selector carried by `request`
    pub fn create_runner(&self, request: &DispatchRequest) -> Result<Box<dyn TaskRunner>, RegistryError> {
        let runner_type = self.resolve_selector(&request.runner_type);
        let factory = self
            .factories
            .get(runner_type)
            .ok_or_else(|| RegistryError::UnknownRunnerType(request.runner_type.clone()))?;

        factory.create(request).map_err(|source| RegistryError::CreationFailed {
            runner_type: runner_type.to_string(),
            source,
        })
    }

    /// Get all registered runner types, sorted
    pub fn list_runner_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a runner type
    pub fn get_metadata(&self, runner_type: &str) -> Option<RunnerMetadata> {
        self.factories.get(runner_type).map(|f| f.metadata())
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

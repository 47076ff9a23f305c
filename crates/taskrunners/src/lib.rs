//! Built-in task runners
//!
//! Runners the task manager can dispatch to out of the box.

mod docker;
mod http;
mod noop;

pub use docker::{DockerRunner, DockerRunnerFactory};
pub use http::{HttpRunner, HttpRunnerFactory};
pub use noop::{NoopRunner, NoopRunnerFactory};

use std::sync::Arc;
use taskcore::{DispatchRequest, RunnerError};
use taskruntime::RunnerRegistry;

/// Register all built-in runners with a registry
pub fn register_all(registry: &mut RunnerRegistry) {
    registry.register(Arc::new(noop::NoopRunnerFactory));
    registry.register(Arc::new(docker::DockerRunnerFactory));
    registry.register(Arc::new(http::HttpRunnerFactory));
}

/// Required string argument of a dispatch request
fn string_argument(request: &DispatchRequest, name: &str) -> Result<String, RunnerError> {
    request
        .require_argument(name)
        .map_err(|e| RunnerError::Configuration(e.to_string()))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RunnerError::Configuration(format!("argument '{}' must be a string", name)))
}

fn optional_string_argument(request: &DispatchRequest, name: &str) -> Option<String> {
    request
        .arguments
        .get(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

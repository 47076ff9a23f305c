//! Task dispatch runtime
//!
//! This crate provides the task manager that consumes dispatch and completion
//! messages, the admission control bounding concurrent executions, and the
//! registry that turns runner selectors into runner instances.

mod admission;
mod config;
mod error;
mod manager;
mod registry;

pub use admission::AdmissionControl;
pub use config::ManagerConfig;
pub use error::{ConfigError, RegistryError};
pub use manager::{ServiceStatus, TaskManager};
pub use registry::{ArgumentDefinition, RunnerFactory, RunnerMetadata, RunnerRegistry};

use crate::{evaluate_condition, extract_fragments, ConditionError, ContextBinder, SeriesAttributeLookup};
use std::future::Future;
use std::sync::Arc;
use taskcore::WorkflowInstance;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Resolves `{{ ... }}` parameters in a condition and evaluates it.
///
/// The workflow instance is passed to every call and never stored, so one
/// parser can serve concurrent resolutions.
#[derive(Clone)]
pub struct ConditionalParameterParser {
    lookup: Arc<dyn SeriesAttributeLookup>,
}

impl ConditionalParameterParser {
    pub fn new(lookup: Arc<dyn SeriesAttributeLookup>) -> Self {
        Self { lookup }
    }

    /// Whether the edge guarded by `conditions` should be taken.
    ///
    /// Any resolution or evaluation failure is logged and counts as `false`.
    pub async fn try_parse(&self, conditions: &str, instance: &WorkflowInstance) -> bool {
        let result = match self.resolve_parameters(conditions, instance).await {
            Ok(resolved) => evaluate_condition(&resolved),
            Err(e) => Err(e),
        };

        match result {
            Ok(taken) => {
                tracing::debug!("Condition '{}' evaluated to {}", conditions, taken);
                taken
            }
            Err(e) => {
                tracing::warn!("Failure attempting to parse condition '{}': {}", conditions, e);
                false
            }
        }
    }

    /// Replace every expression in `conditions` with a quoted literal.
    ///
    /// Example: `{{ context.executions.task['other task'].'Fred' }} == 'x'`
    /// becomes `'42' == 'x'`, or `'null' == 'x'` when the value is unknown.
    pub async fn resolve_parameters(
        &self,
        conditions: &str,
        instance: &WorkflowInstance,
    ) -> Result<String, ConditionError> {
        if conditions.trim().is_empty() {
            return Err(ConditionError::Syntax {
                position: 0,
                message: "empty condition".to_string(),
            });
        }

        let fragments = extract_fragments(conditions);
        if fragments.is_empty() {
            return Ok(conditions.to_string());
        }

        let binder = ContextBinder::new(instance, self.lookup.as_ref());
        let mut bindings = Vec::with_capacity(fragments.len());
        for fragment in &fragments {
            let binding = binder.bind(&fragment.expression).await.map_err(|e| {
                tracing::error!("Failed to resolve '{}': {}", fragment.expression, e);
                e
            })?;
            bindings.push(binding);
        }

        // Back to front so earlier offsets stay valid.
        let mut resolved = conditions.to_string();
        for (fragment, binding) in fragments.iter().zip(bindings.iter()).rev() {
            resolved.replace_range(fragment.start..fragment.end, &binding.literal());
        }

        Ok(resolved)
    }

    /// Blocking form of [`try_parse`](Self::try_parse) for synchronous callers
    pub fn try_parse_blocking(&self, conditions: &str, instance: &WorkflowInstance) -> bool {
        match block_on(self.try_parse(conditions, instance)) {
            Ok(taken) => taken,
            Err(e) => {
                tracing::warn!("Failure attempting to parse condition '{}': {}", conditions, e);
                false
            }
        }
    }

    /// Blocking form of [`resolve_parameters`](Self::resolve_parameters)
    pub fn resolve_parameters_blocking(
        &self,
        conditions: &str,
        instance: &WorkflowInstance,
    ) -> Result<String, ConditionError> {
        block_on(self.resolve_parameters(conditions, instance))?
    }
}

/// Drive an async resolution to completion from synchronous code.
///
/// Inside a multi-threaded runtime the worker is handed off with
/// `block_in_place`. A current-thread runtime cannot be re-entered or
/// blocked while it drives timers and IO, so there the future runs on a
/// scoped thread with its own runtime. Outside any runtime a private
/// current-thread runtime is built.
fn block_on<F>(future: F) -> Result<F::Output, ConditionError>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(move || Ok(private_runtime()?.block_on(future)))
                .join()
                .unwrap_or_else(|_| Err(ConditionError::Runtime("resolution thread panicked".to_string())))
        }),
        Err(_) => Ok(private_runtime()?.block_on(future)),
    }
}

fn private_runtime() -> Result<tokio::runtime::Runtime, ConditionError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ConditionError::Runtime(e.to_string()))
}

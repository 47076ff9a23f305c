use crate::{ConditionError, SeriesAttributeLookup};
use taskcore::WorkflowInstance;

/// Prefix of expressions reading metadata of a prior task execution
pub const EXECUTIONS_TASK: &str = "context.executions.task";

/// Prefix of expressions reading attributes of the payload's imaging series
pub const CONTEXT_DICOM_SERIES: &str = "context.dicom.series";

/// Which data source an expression was bound against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterContext {
    Undefined,
    TaskExecutions,
    DicomSeries,
}

/// Result of binding one expression. `value == None` renders as `'null'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub value: Option<String>,
    pub context: ParameterContext,
}

impl Binding {
    fn null(context: ParameterContext) -> Self {
        Self { value: None, context }
    }

    fn resolved(value: Option<String>, context: ParameterContext) -> Self {
        Self { value, context }
    }

    /// Single-quoted literal substituted into the condition string
    pub fn literal(&self) -> String {
        format!("'{}'", self.value.as_deref().unwrap_or("null"))
    }
}

/// Binds expressions against one workflow instance for the duration of a
/// single resolution.
pub struct ContextBinder<'a> {
    instance: &'a WorkflowInstance,
    lookup: &'a dyn SeriesAttributeLookup,
}

impl<'a> ContextBinder<'a> {
    pub fn new(instance: &'a WorkflowInstance, lookup: &'a dyn SeriesAttributeLookup) -> Self {
        Self { instance, lookup }
    }

    /// Resolve an expression stripped of its `{{ }}` delimiters
    pub async fn bind(&self, expression: &str) -> Result<Binding, ConditionError> {
        let expression = expression.trim();
        if let Some(reference) = expression.strip_prefix(EXECUTIONS_TASK) {
            return self.bind_task_metadata(expression, reference);
        }
        if let Some(accessor) = expression.strip_prefix(CONTEXT_DICOM_SERIES) {
            return self.bind_series_attribute(expression, accessor).await;
        }

        tracing::debug!("Unrecognized expression '{}', binding to null", expression);
        Ok(Binding::null(ParameterContext::Undefined))
    }

    /// `['taskId'].'metadataKey'`
    fn bind_task_metadata(&self, expression: &str, reference: &str) -> Result<Binding, ConditionError> {
        let (task_id, key) = parse_task_reference(expression, reference)?;

        let Some(task) = self.instance.find_task(task_id) else {
            tracing::debug!("Task '{}' not found in workflow instance {}", task_id, self.instance.id);
            return Ok(Binding::null(ParameterContext::TaskExecutions));
        };
        if task.metadata.is_empty() {
            return Ok(Binding::null(ParameterContext::TaskExecutions));
        }

        let value = task
            .metadata
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::to_string);
        Ok(Binding::resolved(value, ParameterContext::TaskExecutions))
    }

    /// `.any('gggg','eeee')` or `.all('gggg','eeee')`
    async fn bind_series_attribute(
        &self,
        expression: &str,
        accessor: &str,
    ) -> Result<Binding, ConditionError> {
        let accessor = accessor.trim_start();
        let any = accessor.starts_with(".any");
        if !any && !accessor.starts_with(".all") {
            return Ok(Binding::null(ParameterContext::DicomSeries));
        }

        let tokens: Vec<&str> = quoted_tokens(accessor).collect();
        if tokens.len() < 2 {
            return Err(ConditionError::malformed(
                expression,
                "expected two quoted attribute tokens",
            ));
        }
        let key = format!("{}{}", tokens[0], tokens[1]);

        let payload_id = self.instance.payload_id.as_str();
        let bucket_id = self.instance.bucket_id.as_str();
        let value = if any {
            self.lookup.get_any_value(&key, payload_id, bucket_id).await?
        } else {
            self.lookup.get_all_values(&key, payload_id, bucket_id).await?
        };

        Ok(Binding::resolved(value, ParameterContext::DicomSeries))
    }
}

fn parse_task_reference<'e>(
    expression: &str,
    reference: &'e str,
) -> Result<(&'e str, &'e str), ConditionError> {
    let rest = reference
        .trim_start()
        .strip_prefix('[')
        .ok_or_else(|| ConditionError::malformed(expression, "expected ['task id']"))?;
    let close = rest
        .find(']')
        .ok_or_else(|| ConditionError::malformed(expression, "unterminated task id bracket"))?;

    let task_id = rest[..close].trim().trim_matches('\'');
    if task_id.is_empty() {
        return Err(ConditionError::malformed(expression, "empty task id"));
    }

    let key = quoted_tokens(&rest[close + 1..])
        .next()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ConditionError::malformed(expression, "expected a quoted metadata key"))?;

    Ok((task_id, key))
}

/// Contents of each single-quoted run, in order
fn quoted_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split('\'').skip(1).step_by(2)
}

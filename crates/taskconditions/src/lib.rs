//! Conditional branching resolver
//!
//! Decides whether a workflow edge is taken. A condition string may embed
//! `{{ ... }}` expressions that are bound against the workflow instance
//! (prior task metadata) or against series attributes of the payload, then
//! substituted as literals and evaluated as a boolean expression.

mod binder;
mod error;
mod evaluator;
mod lookup;
mod resolver;
mod tokenizer;

pub use binder::{Binding, ContextBinder, ParameterContext, CONTEXT_DICOM_SERIES, EXECUTIONS_TASK};
pub use error::ConditionError;
pub use evaluator::{evaluate_condition, ConditionalGroup};
pub use lookup::{SeriesAttributeLookup, StaticSeriesLookup};
pub use resolver::ConditionalParameterParser;
pub use tokenizer::{extract_fragments, ExpressionFragment};

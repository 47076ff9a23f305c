use crate::ConditionError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Attribute values of the imaging series attached to a payload.
///
/// `key` is the concatenated group and element of the attribute tag
/// (e.g. `00080060` for modality).
#[async_trait]
pub trait SeriesAttributeLookup: Send + Sync {
    /// Value of the attribute on any instance of the series that has it
    async fn get_any_value(
        &self,
        key: &str,
        payload_id: &str,
        bucket_id: &str,
    ) -> Result<Option<String>, ConditionError>;

    /// Value of the attribute when every instance of the series agrees on it
    async fn get_all_values(
        &self,
        key: &str,
        payload_id: &str,
        bucket_id: &str,
    ) -> Result<Option<String>, ConditionError>;
}

/// Lookup over a fixed table of per-instance attribute values.
///
/// Deserializes from a JSON object mapping attribute keys to the value each
/// instance carries, e.g. `{"00080060": ["CT", "CT"]}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticSeriesLookup {
    values: HashMap<String, Vec<String>>,
}

impl StaticSeriesLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl SeriesAttributeLookup for StaticSeriesLookup {
    async fn get_any_value(
        &self,
        key: &str,
        _payload_id: &str,
        _bucket_id: &str,
    ) -> Result<Option<String>, ConditionError> {
        Ok(self.values.get(key).and_then(|values| values.first().cloned()))
    }

    async fn get_all_values(
        &self,
        key: &str,
        _payload_id: &str,
        _bucket_id: &str,
    ) -> Result<Option<String>, ConditionError> {
        let Some(values) = self.values.get(key) else {
            return Ok(None);
        };
        let Some(first) = values.first() else {
            return Ok(None);
        };
        if values.iter().all(|v| v == first) {
            Ok(Some(first.clone()))
        } else {
            Ok(None)
        }
    }
}

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// A structured record produced by an extractor
///
/// Serializes as a plain JSON object of its fields. The sleep hint is a
/// request to pause after publishing, honored only in calm mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    fields: Map<String, Value>,
    #[serde(skip)]
    sleep_hint: Duration,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Asks the engine to pause this long after the record is published
    pub fn sleep_for(mut self, hint: Duration) -> Self {
        self.sleep_hint = hint;
        self
    }

    pub fn sleep_hint(&self) -> Duration {
        self.sleep_hint
    }

    /// JSON payload sent to the broker
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

//! Published state snapshot.

use serde_json::{Map, Value};

/// Name of the field every snapshot starts with.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// One cycle's worth of named readings.
///
/// Fields keep the producer registration order, with [`TIMESTAMP_FIELD`]
/// first. Snapshots are immutable once published.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    fields: Vec<(String, Value)>,
}

impl Snapshot {
    /// `timestamp` is seconds since the Unix epoch.
    pub fn new(timestamp: f64, readings: Vec<(String, Value)>) -> Self {
        let mut fields = Vec::with_capacity(readings.len() + 1);
        fields.push((TIMESTAMP_FIELD.to_string(), Value::from(timestamp)));
        fields.extend(readings);
        Self { fields }
    }

    pub fn timestamp(&self) -> f64 {
        self.fields
            .first()
            .and_then(|(_, value)| value.as_f64())
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.fields.iter().cloned().collect()
    }
}

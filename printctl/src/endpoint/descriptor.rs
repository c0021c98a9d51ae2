//! Descriptor tree types as they appear in the endpoint JSON document.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ControlError, ControlResult};

/// Descriptor bundled for the Ultimaker S3 family, keyed by model.
pub const BUNDLED_DESCRIPTOR: &str = include_str!("../../resources/endpoints.json");

/// A leaf endpoint declared by a node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndpointLeaf {
    /// Grouping key, e.g. `bed`.
    pub category: String,
    /// Lookup key within the category, e.g. `tgt_temp`.
    pub label: String,
    /// Sub-path joined onto the node path. Absent means the node path itself.
    #[serde(default)]
    pub path: Option<String>,
    /// Raw limit declaration: `[min, max]` or a list of choices.
    #[serde(default)]
    pub inputlim: Option<Value>,
}

/// A node of the descriptor tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndpointNode {
    pub path: String,
    #[serde(default)]
    pub endpoints: Option<Vec<EndpointLeaf>>,
    #[serde(default)]
    pub items: Option<Vec<EndpointNode>>,
}

/// A full descriptor document: device model → top-level nodes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    models: HashMap<String, Vec<EndpointNode>>,
}

impl Descriptor {
    /// Parses a descriptor document.
    pub fn parse(json: &str) -> ControlResult<Self> {
        serde_json::from_str(json).map_err(|e| ControlError::malformed("document", e.to_string()))
    }

    /// The descriptor shipped with the crate.
    pub fn bundled() -> ControlResult<Self> {
        Self::parse(BUNDLED_DESCRIPTOR)
    }

    /// Top-level nodes for `model`.
    pub fn model(&self, model: &str) -> ControlResult<&[EndpointNode]> {
        self.models
            .get(model)
            .map(Vec::as_slice)
            .ok_or_else(|| ControlError::malformed(model, "unknown device model"))
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

impl FromStr for Descriptor {
    type Err = ControlError;

    fn from_str(json: &str) -> ControlResult<Self> {
        Self::parse(json)
    }
}

//! Flattens a descriptor tree into routing and limits tables.

use std::collections::HashMap;

use tracing::trace;

use super::descriptor::{Descriptor, EndpointLeaf, EndpointNode};
use super::limits::LimitSpec;
use crate::error::{ControlError, ControlResult};

/// Label → URL for one category.
pub type CategoryRoutes = HashMap<String, String>;

/// Label → limit for one category.
pub type CategoryLimits = HashMap<String, LimitSpec>;

/// `category → label → absolute URL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    categories: HashMap<String, CategoryRoutes>,
}

impl RoutingTable {
    pub fn url(&self, category: &str, label: &str) -> Option<&str> {
        self.categories
            .get(category)
            .and_then(|routes| routes.get(label))
            .map(String::as_str)
    }

    pub fn category(&self, category: &str) -> Option<&CategoryRoutes> {
        self.categories.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&String, &CategoryRoutes)> {
        self.categories.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Number of labels across every category.
    pub fn len(&self) -> usize {
        self.categories.values().map(HashMap::len).sum()
    }

    fn merge(&mut self, other: RoutingTable) {
        for (category, routes) in other.categories {
            self.categories.entry(category).or_default().extend(routes);
        }
    }
}

/// `category → label → limit`, only for endpoints that declare one.
///
/// Every category that declares endpoints has a bucket, possibly empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitsTable {
    categories: HashMap<String, CategoryLimits>,
}

impl LimitsTable {
    pub fn limit(&self, category: &str, label: &str) -> Option<&LimitSpec> {
        self.categories
            .get(category)
            .and_then(|limits| limits.get(label))
    }

    pub fn category(&self, category: &str) -> Option<&CategoryLimits> {
        self.categories.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&String, &CategoryLimits)> {
        self.categories.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn merge(&mut self, other: LimitsTable) {
        for (category, limits) in other.categories {
            self.categories.entry(category).or_default().extend(limits);
        }
    }
}

/// Output of [`compile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointTables {
    pub routes: RoutingTable,
    pub limits: LimitsTable,
}

impl EndpointTables {
    fn merge(&mut self, other: EndpointTables) {
        self.routes.merge(other.routes);
        self.limits.merge(other.limits);
    }
}

/// Compiles `nodes` against `base` (e.g. `http://10.0.0.2`).
pub fn compile(nodes: &[EndpointNode], base: &str) -> ControlResult<EndpointTables> {
    let mut tables = EndpointTables::default();
    for node in nodes {
        tables.merge(compile_node(node, base)?);
    }
    Ok(tables)
}

/// Parses a model-keyed descriptor document and compiles one model.
pub fn compile_model(json: &str, model: &str, base: &str) -> ControlResult<EndpointTables> {
    let descriptor = Descriptor::parse(json)?;
    compile(descriptor.model(model)?, base)
}

fn compile_node(node: &EndpointNode, base: &str) -> ControlResult<EndpointTables> {
    let path = join_path(base, &node.path);
    let mut tables = EndpointTables::default();

    if let Some(leaves) = &node.endpoints {
        tables.merge(collect_leaves(leaves, &path)?);
    }

    if let Some(children) = &node.items {
        for child in children {
            tables.merge(compile_node(child, &path)?);
        }
    }

    Ok(tables)
}

fn collect_leaves(leaves: &[EndpointLeaf], base: &str) -> ControlResult<EndpointTables> {
    let mut tables = EndpointTables::default();

    for leaf in leaves {
        if leaf.category.is_empty() {
            return Err(ControlError::malformed(base, "endpoint has an empty category"));
        }
        if leaf.label.is_empty() {
            return Err(ControlError::malformed(
                format!("{} ({})", base, leaf.category),
                "endpoint has an empty label",
            ));
        }

        let url = match &leaf.path {
            Some(sub) => join_path(base, sub),
            None => base.trim_end_matches('/').to_string(),
        };
        trace!(category = %leaf.category, label = %leaf.label, url = %url, "Endpoint compiled");

        tables
            .routes
            .categories
            .entry(leaf.category.clone())
            .or_default()
            .insert(leaf.label.clone(), url);

        let limits = tables
            .limits
            .categories
            .entry(leaf.category.clone())
            .or_default();
        if let Some(raw) = &leaf.inputlim {
            let location = format!("{}.{}", leaf.category, leaf.label);
            limits.insert(leaf.label.clone(), LimitSpec::from_value(raw, &location)?);
        }
    }

    Ok(tables)
}

/// Joins a path segment onto a base.
///
/// An absolute URL segment replaces the base; anything else is appended with
/// exactly one `/` between the two. The result has no trailing `/`.
pub fn join_path(base: &str, segment: &str) -> String {
    if segment.contains("://") {
        return segment.trim_end_matches('/').to_string();
    }
    let segment = segment.trim_start_matches('/');
    let base = base.trim_end_matches('/');
    if segment.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, segment).trim_end_matches('/').to_string()
}

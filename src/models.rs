use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property map of a node or edge. Ordered so serialization is deterministic.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Query parameters, keyed by name without the `$` prefix.
pub type Params = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            id: id.into(),
            labels,
            properties: Properties::new(),
            x: None,
            y: None,
            radius: None,
            color: None,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// First label, used as the node's type for colour and icon selection.
    pub fn primary_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// Both coordinates, or nothing.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(alias = "source")]
    pub start_node: String,
    #[serde(alias = "target")]
    pub end_node: String,
    #[serde(default)]
    pub properties: Properties,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        edge_type: impl Into<String>,
        start_node: impl Into<String>,
        end_node: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            edge_type: edge_type.into(),
            start_node: start_node.into(),
            end_node: end_node.into(),
            properties: Properties::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default, alias = "relationships", alias = "edges")]
    pub links: Vec<GraphEdge>,
}

impl GraphData {
    pub fn new(nodes: Vec<GraphNode>, links: Vec<GraphEdge>) -> Self {
        Self { nodes, links }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

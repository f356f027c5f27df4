//! Validation and repair of raw query results.
//!
//! [`validate`] is strict about shape and size and rejects the graph
//! wholesale on any error. Dangling relationships and isolated nodes are
//! only warnings. [`sanitize`] wraps it and never fails.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::f64::consts::PI;
use tracing::{debug, warn};

use crate::lod::palette::color_for_label;
use crate::models::{GraphData, GraphEdge, GraphNode, Properties};

pub const BASE_RADIUS: f64 = 8.0;
pub const RADIUS_PER_PROPERTY: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOptions {
    pub require_id: bool,
    pub require_labels: bool,
    pub max_nodes: usize,
    pub max_relationships: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            require_id: true,
            require_labels: false,
            max_nodes: 10_000,
            max_relationships: 20_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<GraphData>,
}

impl ValidationResult {
    fn rejected(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings,
            data: None,
        }
    }
}

/// Validates an untyped graph document (`{"nodes": [...], "links": [...]}`).
pub fn validate(raw: &Value, options: &ValidationOptions) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(object) = raw.as_object() else {
        return ValidationResult::rejected(
            vec!["Graph data must be an object".to_string()],
            warnings,
        );
    };

    let raw_nodes = array_field(object, &["nodes"], "nodes", &mut errors);
    let raw_links = array_field(
        object,
        &["links", "relationships", "edges"],
        "relationships",
        &mut errors,
    );

    check_caps(raw_nodes.len(), raw_links.len(), options, &mut errors);
    if !errors.is_empty() {
        return ValidationResult::rejected(errors, warnings);
    }

    let nodes: Vec<GraphNode> = raw_nodes
        .iter()
        .enumerate()
        .filter_map(|(i, value)| parse_node(i, value, options, &mut errors, &mut warnings))
        .collect();
    let links: Vec<GraphEdge> = raw_links
        .iter()
        .enumerate()
        .filter_map(|(i, value)| parse_edge(i, value, &mut errors))
        .collect();

    if !errors.is_empty() {
        return ValidationResult::rejected(errors, warnings);
    }

    finalize(GraphData::new(nodes, links), warnings)
}

/// Cap, identity and cross-reference checks for already-typed data.
pub fn validate_graph(data: GraphData, options: &ValidationOptions) -> ValidationResult {
    let mut errors = Vec::new();
    check_caps(data.nodes.len(), data.links.len(), options, &mut errors);
    if !errors.is_empty() {
        return ValidationResult::rejected(errors, Vec::new());
    }
    finalize(data, Vec::new())
}

/// Validated graph, or an empty one if validation fails.
pub fn sanitize(raw: &Value, options: &ValidationOptions) -> GraphData {
    accept_or_empty(validate(raw, options))
}

pub fn sanitize_graph(data: GraphData, options: &ValidationOptions) -> GraphData {
    accept_or_empty(validate_graph(data, options))
}

fn accept_or_empty(result: ValidationResult) -> GraphData {
    for warning in &result.warnings {
        debug!("Graph data warning: {}", warning);
    }
    match result.data {
        Some(data) if result.is_valid => data,
        _ => {
            warn!(
                "Rejected graph data with {} errors: {}",
                result.errors.len(),
                result.errors.join("; ")
            );
            GraphData::empty()
        }
    }
}

/// Scatters unpositioned nodes uniformly inside a disk of radius
/// `min(width, height) / 4` around the canvas centre. Positioned nodes are
/// returned unchanged.
pub fn generate_node_coordinates<R: Rng + ?Sized>(
    nodes: &[GraphNode],
    width: f64,
    height: f64,
    rng: &mut R,
) -> Vec<GraphNode> {
    let (cx, cy) = (width / 2.0, height / 2.0);
    let max_radius = width.min(height).max(0.0) / 4.0;

    nodes
        .iter()
        .map(|node| {
            if node.position().is_some() {
                return node.clone();
            }
            let angle = rng.gen::<f64>() * 2.0 * PI;
            let distance = max_radius * rng.gen::<f64>().sqrt();
            node.clone()
                .with_position(cx + distance * angle.cos(), cy + distance * angle.sin())
        })
        .collect()
}

/// Keeps the first `max_nodes` nodes, drops relationships that lost an
/// endpoint, then keeps at most `max_links` of the rest.
pub fn truncate_graph_data(data: &GraphData, max_nodes: usize, max_links: usize) -> GraphData {
    let nodes: Vec<GraphNode> = data.nodes.iter().take(max_nodes).cloned().collect();
    let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let links: Vec<GraphEdge> = data
        .links
        .iter()
        .filter(|e| kept.contains(e.start_node.as_str()) && kept.contains(e.end_node.as_str()))
        .take(max_links)
        .cloned()
        .collect();

    GraphData::new(nodes, links)
}

fn finalize(data: GraphData, mut warnings: Vec<String>) -> ValidationResult {
    let mut errors = Vec::new();

    let mut node_ids = HashSet::with_capacity(data.nodes.len());
    for node in &data.nodes {
        if !node_ids.insert(node.id.as_str()) {
            errors.push(format!("Duplicate node id {}", node.id));
        }
    }
    if !errors.is_empty() {
        return ValidationResult::rejected(errors, warnings);
    }

    let mut link_ids = HashSet::with_capacity(data.links.len());
    let mut connected = HashSet::new();
    let mut links = Vec::with_capacity(data.links.len());
    for edge in data.links {
        let missing: Vec<&str> = [edge.start_node.as_str(), edge.end_node.as_str()]
            .into_iter()
            .filter(|id| !node_ids.contains(id))
            .collect();
        if !missing.is_empty() {
            warnings.push(format!(
                "Relationship {} references missing node {}; dropped",
                edge.id,
                missing.join(", ")
            ));
            continue;
        }
        if !link_ids.insert(edge.id.clone()) {
            warnings.push(format!("Duplicate relationship id {}; dropped", edge.id));
            continue;
        }
        connected.insert(edge.start_node.clone());
        connected.insert(edge.end_node.clone());
        links.push(edge);
    }

    let nodes: Vec<GraphNode> = data
        .nodes
        .into_iter()
        .map(|mut node| {
            if !connected.contains(&node.id) {
                warnings.push(format!("Isolated node {} has no relationships", node.id));
            }
            if node.radius.is_none() {
                node.radius = Some(default_radius(&node.properties));
            }
            if node.color.is_none() {
                node.color = Some(color_for_label(node.primary_label()).to_string());
            }
            node
        })
        .collect();

    ValidationResult {
        is_valid: true,
        errors,
        warnings,
        data: Some(GraphData::new(nodes, links)),
    }
}

fn default_radius(properties: &Properties) -> f64 {
    BASE_RADIUS + properties.len().min(10) as f64 * RADIUS_PER_PROPERTY
}

fn check_caps(nodes: usize, links: usize, options: &ValidationOptions, errors: &mut Vec<String>) {
    if nodes > options.max_nodes {
        errors.push(format!(
            "Too many nodes: {} exceeds the limit of {}",
            nodes, options.max_nodes
        ));
    }
    if links > options.max_relationships {
        errors.push(format!(
            "Too many relationships: {} exceeds the limit of {}",
            links, options.max_relationships
        ));
    }
}

fn array_field<'a>(
    object: &'a Map<String, Value>,
    keys: &[&str],
    name: &str,
    errors: &mut Vec<String>,
) -> &'a [Value] {
    match keys.iter().find_map(|k| object.get(*k)) {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            errors.push(format!("{name} must be an array"));
            &[]
        }
    }
}

fn parse_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn parse_properties(value: Option<&Value>) -> Result<Properties, ()> {
    match value {
        None | Some(Value::Null) => Ok(Properties::new()),
        Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Some(_) => Err(()),
    }
}

fn parse_node(
    index: usize,
    value: &Value,
    options: &ValidationOptions,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> Option<GraphNode> {
    let Some(object) = value.as_object() else {
        errors.push(format!("Node at index {index} must be an object"));
        return None;
    };
    let before = errors.len();

    let id = match parse_id(object.get("id")) {
        Some(id) => id,
        None if options.require_id => {
            errors.push(format!("Node at index {index} is missing a valid id"));
            String::new()
        }
        None => format!("node-{index}"),
    };

    let labels = match object.get("labels") {
        Some(Value::Array(items)) => {
            let labels: Option<Vec<String>> = items
                .iter()
                .map(|l| l.as_str().map(str::to_string))
                .collect();
            labels.unwrap_or_else(|| {
                errors.push(format!("Node {id} has non-string labels"));
                Vec::new()
            })
        }
        None | Some(Value::Null) if !options.require_labels => Vec::new(),
        _ => {
            errors.push(format!("Node {id} labels must be an array"));
            Vec::new()
        }
    };

    let properties = parse_properties(object.get("properties")).unwrap_or_else(|_| {
        errors.push(format!("Node {id} properties must be an object"));
        Properties::new()
    });

    let radius = match object.get("radius") {
        None | Some(Value::Null) => None,
        Some(v) => v.as_f64().or_else(|| {
            errors.push(format!("Node {id} radius must be a number"));
            None
        }),
    };

    let color = match object.get("color") {
        None | Some(Value::Null) => None,
        Some(Value::String(c)) => Some(c.clone()),
        Some(_) => {
            errors.push(format!("Node {id} color must be a string"));
            None
        }
    };

    let x = object.get("x").and_then(Value::as_f64);
    let y = object.get("y").and_then(Value::as_f64);
    let (x, y) = match (x, y) {
        (Some(x), Some(y)) => (Some(x), Some(y)),
        (None, None) => (None, None),
        _ => {
            warnings.push(format!("Node {id} has only one coordinate; position discarded"));
            (None, None)
        }
    };

    if errors.len() > before {
        return None;
    }

    Some(GraphNode {
        id,
        labels,
        properties,
        x,
        y,
        radius,
        color,
    })
}

fn parse_edge(index: usize, value: &Value, errors: &mut Vec<String>) -> Option<GraphEdge> {
    let Some(object) = value.as_object() else {
        errors.push(format!("Relationship at index {index} must be an object"));
        return None;
    };

    let id = parse_id(object.get("id"));
    let edge_type = object.get("type").and_then(Value::as_str).map(str::to_string);
    let start = parse_id(object.get("startNode").or_else(|| object.get("source")));
    let end = parse_id(object.get("endNode").or_else(|| object.get("target")));
    let properties = parse_properties(object.get("properties"));

    let label = id.clone().unwrap_or_else(|| format!("at index {index}"));
    match (id, edge_type, start, end, properties) {
        (Some(id), Some(edge_type), Some(start_node), Some(end_node), Ok(properties)) => {
            Some(GraphEdge {
                id,
                edge_type,
                start_node,
                end_node,
                properties,
            })
        }
        (_, _, _, _, Err(())) => {
            errors.push(format!("Relationship {label} properties must be an object"));
            None
        }
        _ => {
            errors.push(format!(
                "Relationship {label} must have id, type, startNode and endNode"
            ));
            None
        }
    }
}

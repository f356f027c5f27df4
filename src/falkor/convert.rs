use falkordb::FalkorValue;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::executor::{GraphValue, RawNode, RawRelationship, Record};
use crate::models::{Params, Properties};
use crate::queries::is_identifier;

fn properties(props: &HashMap<String, FalkorValue>) -> Properties {
    props
        .iter()
        .map(|(key, value)| (key.clone(), graph_value(value).to_json()))
        .collect()
}

pub fn graph_value(value: &FalkorValue) -> GraphValue {
    match value {
        FalkorValue::None => GraphValue::Null,
        FalkorValue::Bool(b) => GraphValue::Bool(*b),
        FalkorValue::I64(i) => GraphValue::Int(*i),
        FalkorValue::F64(f) => GraphValue::Float(*f),
        FalkorValue::String(s) => GraphValue::String(s.clone()),
        FalkorValue::Array(items) => GraphValue::List(items.iter().map(graph_value).collect()),
        FalkorValue::Map(entries) => GraphValue::Map(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), graph_value(value)))
                .collect::<BTreeMap<_, _>>(),
        ),
        FalkorValue::Node(node) => GraphValue::Node(RawNode {
            identity: node.entity_id.to_string(),
            labels: node.labels.clone(),
            properties: properties(&node.properties),
        }),
        FalkorValue::Edge(edge) => GraphValue::Relationship(RawRelationship {
            identity: edge.entity_id.to_string(),
            rel_type: edge.relationship_type.clone(),
            start: edge.src_node_id.to_string(),
            end: edge.dst_node_id.to_string(),
            properties: properties(&edge.properties),
        }),
        other => GraphValue::String(format!("{:?}", other)),
    }
}

pub fn record(header: &[String], row: Vec<FalkorValue>) -> Record {
    let values: Vec<GraphValue> = row.iter().map(graph_value).collect();
    let keys = (0..values.len())
        .map(|i| header.get(i).cloned().unwrap_or_else(|| i.to_string()))
        .collect();
    Record::new(keys, values)
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Renders a JSON value as a Cypher literal. The FalkorDB client takes
/// parameters as literal text.
pub fn cypher_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(cypher_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(key, value)| {
                    let key = if is_identifier(key) {
                        key.clone()
                    } else {
                        format!("`{}`", key.replace('`', "``"))
                    };
                    format!("{key}: {}", cypher_literal(value))
                })
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

pub fn cypher_params(params: &Params) -> HashMap<String, String> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), cypher_literal(value)))
        .collect()
}

//! The data-source seam.
//!
//! Everything above this module talks to the graph store through
//! [`QueryExecutor`]. Results come back as loosely typed [`Record`]s which
//! [`extract_graph`] folds into a [`GraphData`] working set.

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::warn;

use crate::error::{ExplorerError, ExplorerResult};
use crate::models::{GraphData, GraphEdge, GraphNode, Params, Properties};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawNode {
    pub identity: String,
    pub labels: Vec<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRelationship {
    pub identity: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub start: String,
    pub end: String,
    pub properties: Properties,
}

/// A single value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GraphValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<GraphValue>),
    Map(BTreeMap<String, GraphValue>),
    Node(RawNode),
    Relationship(RawRelationship),
}

impl GraphValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GraphValue::Int(i) => Some(*i),
            GraphValue::Float(f) => Some(*f as i64),
            GraphValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One result row with named-field access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    keys: Vec<String>,
    values: Vec<GraphValue>,
}

impl Record {
    pub fn new(keys: Vec<String>, values: Vec<GraphValue>) -> Self {
        Self { keys, values }
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, GraphValue)>,
        K: Into<String>,
    {
        let (keys, values) = pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self { keys, values }
    }

    pub fn get(&self, key: &str) -> Option<&GraphValue> {
        self.keys
            .iter()
            .position(|k| k == key)
            .and_then(|i| self.values.get(i))
    }

    pub fn get_index(&self, index: usize) -> Option<&GraphValue> {
        self.values.get(index)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[GraphValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (i, value) in self.values.iter().enumerate() {
            match self.keys.get(i) {
                Some(key) => map.serialize_entry(key, value)?,
                None => map.serialize_entry(&i.to_string(), value)?,
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub records: Vec<Record>,
}

impl QueryResult {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

/// Executes native query text against one graph.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn run(&self, query: &str, params: &Params) -> ExplorerResult<QueryResult>;

    /// Execution plan lines for `query`, without running it.
    async fn explain(&self, query: &str, params: &Params) -> ExplorerResult<Vec<String>>;
}

/// Bounds every call of the wrapped executor by a fixed timeout.
pub struct Deadline<E> {
    inner: E,
    timeout: Duration,
}

impl<E> Deadline<E> {
    pub fn new(inner: E, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn elapsed_error(&self, query: &str) -> ExplorerError {
        warn!("Query exceeded {:?}: {}", self.timeout, query);
        ExplorerError::Timeout(self.timeout.as_millis() as u64)
    }
}

#[async_trait]
impl<E: QueryExecutor> QueryExecutor for Deadline<E> {
    async fn run(&self, query: &str, params: &Params) -> ExplorerResult<QueryResult> {
        tokio::time::timeout(self.timeout, self.inner.run(query, params))
            .await
            .map_err(|_| self.elapsed_error(query))?
    }

    async fn explain(&self, query: &str, params: &Params) -> ExplorerResult<Vec<String>> {
        tokio::time::timeout(self.timeout, self.inner.explain(query, params))
            .await
            .map_err(|_| self.elapsed_error(query))?
    }
}

/// Collects every node and relationship found anywhere in `result`,
/// deduplicated by id in first-seen order.
pub fn extract_graph(result: &QueryResult) -> GraphData {
    let mut collector = GraphCollector::default();
    for record in &result.records {
        for value in record.values() {
            collector.visit(value);
        }
    }
    collector.finish()
}

#[derive(Default)]
struct GraphCollector {
    nodes: Vec<GraphNode>,
    links: Vec<GraphEdge>,
    node_ids: HashSet<String>,
    link_ids: HashSet<String>,
}

impl GraphCollector {
    fn visit(&mut self, value: &GraphValue) {
        match value {
            GraphValue::Node(node) => {
                if self.node_ids.insert(node.identity.clone()) {
                    self.nodes.push(GraphNode {
                        properties: node.properties.clone(),
                        ..GraphNode::new(node.identity.clone(), node.labels.clone())
                    });
                }
            }
            GraphValue::Relationship(rel) => {
                if self.link_ids.insert(rel.identity.clone()) {
                    let mut edge = GraphEdge::new(
                        rel.identity.clone(),
                        rel.rel_type.clone(),
                        rel.start.clone(),
                        rel.end.clone(),
                    );
                    edge.properties = rel.properties.clone();
                    self.links.push(edge);
                }
            }
            GraphValue::List(items) => items.iter().for_each(|item| self.visit(item)),
            GraphValue::Map(entries) => entries.values().for_each(|item| self.visit(item)),
            _ => {}
        }
    }

    fn finish(self) -> GraphData {
        GraphData::new(self.nodes, self.links)
    }
}

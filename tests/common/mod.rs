#![allow(dead_code)]

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use graph_explorer::error::{ExplorerError, ExplorerResult};
use graph_explorer::executor::{GraphValue, QueryExecutor, QueryResult, RawNode, RawRelationship, Record};
use graph_explorer::models::{Params, Properties};
use graph_explorer::queries::templates;

lazy_static! {
    static ref WINDOW: Regex = Regex::new(r"SKIP (\d+) LIMIT (\d+)$").unwrap();
}

/// In-memory graph store answering the loader templates, a row table for
/// pagination and canned plans and indexes.
#[derive(Default)]
pub struct MockExecutor {
    nodes: Vec<(String, String)>,
    edges: Vec<(String, String, String)>,
    rows: usize,
    fail_count: bool,
    plan: Vec<String>,
    indexes: Vec<(String, String)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: &str, label: &str) -> Self {
        self.nodes.push((id.to_string(), label.to_string()));
        self
    }

    pub fn with_edge(mut self, id: &str, start: &str, end: &str) -> Self {
        self.edges.push((id.to_string(), start.to_string(), end.to_string()));
        self
    }

    /// A chain `0 - 1 - 2 - ... - (n-1)` of Person nodes.
    pub fn chain(n: usize) -> Self {
        let mut mock = Self::new();
        for i in 0..n {
            mock = mock.with_node(&i.to_string(), "Person");
        }
        for i in 1..n {
            mock = mock.with_edge(&format!("e{}", i - 1), &(i - 1).to_string(), &i.to_string());
        }
        mock
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing_count(mut self) -> Self {
        self.fail_count = true;
        self
    }

    pub fn with_plan(mut self, lines: &[&str]) -> Self {
        self.plan = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_index(mut self, label: &str, property: &str) -> Self {
        self.indexes.push((label.to_string(), property.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn node(&self, id: &str) -> Option<GraphValue> {
        self.nodes.iter().find(|(n, _)| n == id).map(|(id, label)| {
            let mut properties = Properties::new();
            properties.insert("name".to_string(), Value::from(format!("node {id}")));
            GraphValue::Node(RawNode {
                identity: id.clone(),
                labels: vec![label.clone()],
                properties,
            })
        })
    }

    fn relationship(&self, (id, start, end): &(String, String, String)) -> GraphValue {
        GraphValue::Relationship(RawRelationship {
            identity: id.clone(),
            rel_type: "KNOWS".to_string(),
            start: start.clone(),
            end: end.clone(),
            properties: Properties::new(),
        })
    }

    fn hop_rows(&self, from: &[String], limit: usize) -> Vec<Record> {
        let mut rows = Vec::new();
        for origin in from {
            for edge in &self.edges {
                let other = if &edge.1 == origin {
                    &edge.2
                } else if &edge.2 == origin {
                    &edge.1
                } else {
                    continue;
                };
                if let (Some(n), Some(m)) = (self.node(origin), self.node(other)) {
                    rows.push(Record::from_pairs([("n", n), ("r", self.relationship(edge)), ("m", m)]));
                }
            }
        }
        rows.truncate(limit);
        rows
    }

    fn everything(&self) -> Vec<Record> {
        let mut rows: Vec<Record> = self
            .edges
            .iter()
            .filter_map(|edge| {
                Some(Record::from_pairs([
                    ("n", self.node(&edge.1)?),
                    ("r", self.relationship(edge)),
                    ("m", self.node(&edge.2)?),
                ]))
            })
            .collect();
        rows.extend(
            self.nodes
                .iter()
                .filter_map(|(id, _)| self.node(id))
                .map(|n| Record::from_pairs([("n", n)])),
        );
        rows
    }

    fn table(&self, query: &str) -> Vec<Record> {
        let (skip, limit) = WINDOW
            .captures(query)
            .map(|c| (c[1].parse().unwrap(), c[2].parse().unwrap()))
            .unwrap_or((0, self.rows));
        (skip..self.rows.min(skip + limit))
            .map(|i| Record::from_pairs([("n", GraphValue::Int(i as i64))]))
            .collect()
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn limit_param(params: &Params) -> usize {
    params
        .get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(u64::MAX) as usize
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn run(&self, query: &str, params: &Params) -> ExplorerResult<QueryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let records = if query == templates::NEIGHBORS {
            let id = params.get("nodeId").map(id_string).unwrap_or_default();
            self.hop_rows(&[id], limit_param(params))
        } else if query == templates::FRONTIER {
            let ids: Vec<String> = params
                .get("nodeIds")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().map(id_string).collect())
                .unwrap_or_default();
            self.hop_rows(&ids, limit_param(params))
        } else if query == templates::LIST_INDEXES {
            self.indexes
                .iter()
                .map(|(label, property)| {
                    Record::from_pairs([
                        ("label", GraphValue::String(label.clone())),
                        ("properties", GraphValue::List(vec![GraphValue::String(property.clone())])),
                        (
                            "types",
                            GraphValue::Map(BTreeMap::from([(
                                property.clone(),
                                GraphValue::List(vec![GraphValue::String("RANGE".into())]),
                            )])),
                        ),
                        ("status", GraphValue::String("OPERATIONAL".into())),
                    ])
                })
                .collect()
        } else if query.contains("count(*) AS total") {
            if self.fail_count {
                return Err(ExplorerError::database("count not supported"));
            }
            vec![Record::from_pairs([("total", GraphValue::Int(self.rows as i64))])]
        } else if query.starts_with("CREATE INDEX") {
            Vec::new()
        } else if self.rows > 0 {
            self.table(query)
        } else {
            self.everything()
        };

        Ok(QueryResult::new(records))
    }

    async fn explain(&self, query: &str, _params: &Params) -> ExplorerResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(format!("EXPLAIN {query}"));
        Ok(self.plan.clone())
    }
}

pub fn params(pairs: &[(&str, Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

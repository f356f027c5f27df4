//! Delta-only incremental loading for one exploration session.
//!
//! Once a node or relationship id has been handed out it is never handed
//! out again until [`IncrementalLoader::clear`] starts a new exploration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::ExplorerResult;
use crate::executor::{extract_graph, QueryExecutor};
use crate::models::{GraphData, Params};
use crate::queries::templates;
use crate::sanitizer::{sanitize_graph, ValidationOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Row limit of every neighbor or frontier query.
    pub batch_size: usize,
    /// Frontier expansions allowed before the loader reports exhaustion.
    pub max_batches: usize,
    pub preload_threshold: usize,
    pub validation: ValidationOptions,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_batches: 20,
            preload_threshold: 100,
            validation: ValidationOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProgress {
    pub loaded_nodes: usize,
    pub loaded_links: usize,
    /// `loaded_nodes / total_nodes`, absent when no positive total is known.
    pub progress: Option<f64>,
}

pub struct IncrementalLoader<E: QueryExecutor + ?Sized> {
    executor: Arc<E>,
    config: LoaderConfig,
    loaded_node_ids: HashSet<String>,
    loaded_link_ids: HashSet<String>,
    batch_count: usize,
}

/// FalkorDB's `id(n)` is an integer; keep numeric ids numeric.
fn id_param(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_string()))
}

impl<E: QueryExecutor + ?Sized> IncrementalLoader<E> {
    pub fn new(executor: Arc<E>, config: LoaderConfig) -> Self {
        Self {
            executor,
            config,
            loaded_node_ids: HashSet::new(),
            loaded_link_ids: HashSet::new(),
            batch_count: 0,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Starts a new exploration and returns the full, unfiltered result.
    #[instrument(skip(self, params))]
    pub async fn load_initial(&mut self, query: &str, params: &Params) -> ExplorerResult<GraphData> {
        self.clear();
        let result = self.executor.run(query, params).await?;
        let data = sanitize_graph(extract_graph(&result), &self.config.validation);
        self.mark_loaded(&data);
        info!(
            "Initial load delivered {} nodes, {} links",
            data.nodes.len(),
            data.links.len()
        );
        Ok(data)
    }

    /// One-hop neighborhood of `node_id` as returned by the store, before
    /// delta filtering.
    #[instrument(skip(self))]
    pub async fn fetch_neighbors(&self, node_id: &str) -> ExplorerResult<GraphData> {
        let mut params = Params::new();
        params.insert("nodeId".to_string(), id_param(node_id));
        params.insert("limit".to_string(), Value::from(self.config.batch_size));

        let result = self.executor.run(templates::NEIGHBORS, &params).await?;
        Ok(sanitize_graph(extract_graph(&result), &self.config.validation))
    }

    pub async fn load_neighbors(&mut self, node_id: &str) -> ExplorerResult<GraphData> {
        let candidate = self.fetch_neighbors(node_id).await?;
        Ok(self.load_batched_data(candidate))
    }

    /// Expands around a set of boundary nodes. Returns an empty graph
    /// without querying once the batch quota is used up.
    #[instrument(skip(self, node_ids), fields(count = node_ids.len()))]
    pub async fn expand_frontier(&mut self, node_ids: &[String]) -> ExplorerResult<GraphData> {
        if self.is_exhausted() {
            debug!("Batch quota of {} reached, not expanding", self.config.max_batches);
            return Ok(GraphData::empty());
        }
        if node_ids.is_empty() {
            return Ok(GraphData::empty());
        }

        let mut params = Params::new();
        params.insert(
            "nodeIds".to_string(),
            Value::Array(node_ids.iter().map(|id| id_param(id)).collect()),
        );
        params.insert("limit".to_string(), Value::from(self.config.batch_size));

        let result = self.executor.run(templates::FRONTIER, &params).await?;
        let candidate = sanitize_graph(extract_graph(&result), &self.config.validation);
        Ok(self.load_batched_data(candidate))
    }

    /// Keeps only what has not been delivered yet and records it as delivered.
    ///
    /// Relationships whose endpoints are neither loaded nor part of this
    /// batch are held back so they can still be delivered with their nodes.
    pub fn load_batched_data(&mut self, candidate: GraphData) -> GraphData {
        let mut delta = GraphData::empty();

        for node in candidate.nodes {
            if self.loaded_node_ids.insert(node.id.clone()) {
                delta.nodes.push(node);
            }
        }
        for edge in candidate.links {
            let endpoints_known = self.loaded_node_ids.contains(&edge.start_node)
                && self.loaded_node_ids.contains(&edge.end_node);
            if !endpoints_known {
                continue;
            }
            if self.loaded_link_ids.insert(edge.id.clone()) {
                delta.links.push(edge);
            }
        }

        self.batch_count += 1;
        debug!(
            "Batch {} delivered {} new nodes, {} new links",
            self.batch_count,
            delta.nodes.len(),
            delta.links.len()
        );
        delta
    }

    /// Records `data` as delivered without touching the batch counter.
    pub fn mark_loaded(&mut self, data: &GraphData) {
        self.loaded_node_ids
            .extend(data.nodes.iter().map(|n| n.id.clone()));
        self.loaded_link_ids
            .extend(data.links.iter().map(|e| e.id.clone()));
    }

    pub fn should_load_more(&self, visible_node_count: usize) -> bool {
        visible_node_count < self.config.preload_threshold
    }

    /// Progress is measured on nodes only; the link total is accepted for
    /// symmetry with callers that track both.
    pub fn get_progress(&self, total_nodes: Option<usize>, _total_links: Option<usize>) -> LoadProgress {
        let loaded_nodes = self.loaded_node_ids.len();
        LoadProgress {
            loaded_nodes,
            loaded_links: self.loaded_link_ids.len(),
            progress: total_nodes
                .filter(|total| *total > 0)
                .map(|total| loaded_nodes as f64 / total as f64),
        }
    }

    pub fn clear(&mut self) {
        self.loaded_node_ids.clear();
        self.loaded_link_ids.clear();
        self.batch_count = 0;
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    pub fn is_exhausted(&self) -> bool {
        self.batch_count >= self.config.max_batches
    }

    pub fn is_loaded(&self, node_id: &str) -> bool {
        self.loaded_node_ids.contains(node_id)
    }
}

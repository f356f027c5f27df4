//! Session-level composition of the loader, optimizer and result cache.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, TtlCache};
use crate::error::ExplorerResult;
use crate::executor::QueryExecutor;
use crate::loader::{IncrementalLoader, LoadProgress, LoaderConfig};
use crate::models::{GraphData, Params};
use crate::optimizer::{
    self, IndexInfo, OptimizeOptions, OptimizedResult, PaginatedResult, PaginationConfig,
    QueryAnalysis, SchemaInspector,
};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub default_ttl: Duration,
    /// Neighborhoods go stale faster than whole query results.
    pub neighbor_ttl: Duration,
    pub sweep_interval: Duration,
    pub max_entries: usize,
    pub loader: LoaderConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            neighbor_ttl: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(60),
            max_entries: 1_000,
            loader: LoaderConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Graph(GraphData),
    Page(PaginatedResult),
    Optimized(OptimizedResult),
}

pub struct LoaderManager<E: QueryExecutor + ?Sized> {
    executor: Arc<E>,
    loader: IncrementalLoader<E>,
    cache: Arc<Mutex<TtlCache<CachedValue>>>,
    config: ManagerConfig,
    sweeper: Option<JoinHandle<()>>,
}

impl<E: QueryExecutor + ?Sized> LoaderManager<E> {
    pub fn new(executor: Arc<E>, config: ManagerConfig) -> Self {
        Self {
            loader: IncrementalLoader::new(Arc::clone(&executor), config.loader.clone()),
            executor,
            cache: Arc::new(Mutex::new(TtlCache::new(config.max_entries))),
            config,
            sweeper: None,
        }
    }

    pub fn loader(&self) -> &IncrementalLoader<E> {
        &self.loader
    }

    /// Spawns the periodic expiry sweep. Must be called inside a tokio runtime.
    pub fn start_expiry_sweep(&mut self) {
        if let Some(previous) = self.sweeper.take() {
            previous.abort();
        }
        let period = self.config.sweep_interval;
        if period.is_zero() {
            warn!("Cache sweep interval is zero, relying on lazy expiry only");
            return;
        }

        let cache = Arc::clone(&self.cache);
        self.sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.lock().await.sweep();
                if removed > 0 {
                    debug!("Swept {} expired cache entries", removed);
                }
            }
        }));
    }

    async fn cached(&self, key: &str) -> Option<CachedValue> {
        self.cache.lock().await.get(key)
    }

    async fn store(&self, key: String, value: CachedValue, ttl: Duration) {
        self.cache.lock().await.insert(key, value, ttl);
    }

    /// A cache hit replays the delivered ids into the loader so later
    /// expansions stay delta-only.
    pub async fn load_initial(&mut self, query: &str, params: &Params) -> ExplorerResult<GraphData> {
        let key = cache_key("initial", &json!({ "query": query, "params": params }));

        if let Some(CachedValue::Graph(data)) = self.cached(&key).await {
            debug!("Initial load served from cache");
            self.loader.clear();
            self.loader.mark_loaded(&data);
            return Ok(data);
        }

        let data = self.loader.load_initial(query, params).await?;
        self.store(key, CachedValue::Graph(data.clone()), self.config.default_ttl)
            .await;
        Ok(data)
    }

    /// The raw neighborhood is cached, the delta is always computed against
    /// this session's loader.
    pub async fn load_neighbors(&mut self, node_id: &str) -> ExplorerResult<GraphData> {
        let key = cache_key(
            "neighbors",
            &json!({ "nodeId": node_id, "limit": self.config.loader.batch_size }),
        );

        let candidate = match self.cached(&key).await {
            Some(CachedValue::Graph(candidate)) => {
                debug!("Neighbors of {} served from cache", node_id);
                candidate
            }
            _ => {
                let candidate = self.loader.fetch_neighbors(node_id).await?;
                self.store(key, CachedValue::Graph(candidate.clone()), self.config.neighbor_ttl)
                    .await;
                candidate
            }
        };

        Ok(self.loader.load_batched_data(candidate))
    }

    pub async fn expand_frontier(&mut self, node_ids: &[String]) -> ExplorerResult<GraphData> {
        self.loader.expand_frontier(node_ids).await
    }

    pub async fn execute_paginated(
        &self,
        query: &str,
        params: &Params,
        config: &PaginationConfig,
    ) -> ExplorerResult<PaginatedResult> {
        let key = cache_key(
            "paginated",
            &json!({ "query": query, "params": params, "config": config }),
        );
        if let Some(CachedValue::Page(page)) = self.cached(&key).await {
            return Ok(page);
        }

        let page = optimizer::execute_paginated(self.executor.as_ref(), query, params, config).await?;
        self.store(key, CachedValue::Page(page.clone()), self.config.default_ttl)
            .await;
        Ok(page)
    }

    pub async fn execute_optimized(
        &self,
        query: &str,
        params: &Params,
        options: &OptimizeOptions,
    ) -> ExplorerResult<OptimizedResult> {
        let key = cache_key(
            "optimized",
            &json!({ "query": query, "params": params, "options": options }),
        );
        if let Some(CachedValue::Optimized(result)) = self.cached(&key).await {
            return Ok(result);
        }

        let result = optimizer::execute_optimized(self.executor.as_ref(), query, params, options).await?;
        self.store(key, CachedValue::Optimized(result.clone()), self.config.default_ttl)
            .await;
        Ok(result)
    }

    pub async fn analyze_query(&self, query: &str, params: &Params) -> ExplorerResult<QueryAnalysis> {
        optimizer::analyze_query(self.executor.as_ref(), query, params).await
    }

    pub fn get_progress(&self, total_nodes: Option<usize>, total_links: Option<usize>) -> LoadProgress {
        self.loader.get_progress(total_nodes, total_links)
    }

    pub fn should_load_more(&self, visible_node_count: usize) -> bool {
        self.loader.should_load_more(visible_node_count)
    }

    pub async fn list_indexes(&self) -> ExplorerResult<Vec<IndexInfo>> {
        self.executor.list_indexes().await
    }

    /// Cached results may predate the index, so the cache is dropped.
    pub async fn create_index(&self, label: &str, property: &str) -> ExplorerResult<()> {
        self.executor.create_index(label, property).await?;
        self.clear_cache(None).await;
        Ok(())
    }

    pub async fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let removed = self.cache.lock().await.invalidate(pattern);
        info!("Cleared {} cache entries (pattern {:?})", removed, pattern);
        removed
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Resets the exploration and drops every cached result.
    pub async fn clear(&mut self) {
        self.loader.clear();
        self.cache.lock().await.invalidate(None);
    }
}

impl<E: QueryExecutor + ?Sized> Drop for LoaderManager<E> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

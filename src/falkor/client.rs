use anyhow::Result;
use async_trait::async_trait;
use falkordb::{
    AsyncGraph, FalkorAsyncClient, FalkorClientBuilder, FalkorConnectionInfo, FalkorSyncClient,
};
use std::collections::HashMap;
use std::num::NonZeroU8;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use super::convert;
use super::FalkorPool;
use crate::config::Config;
use crate::error::{ExplorerError, ExplorerResult};
use crate::executor::{QueryExecutor, QueryResult};
use crate::models::Params;

/// One connection with its graph selected.
pub struct FalkorGraphClient {
    _client: FalkorAsyncClient,
    graph: AsyncGraph,
}

impl FalkorGraphClient {
    pub async fn new(config: &Config) -> Result<Self> {
        let conn_info: FalkorConnectionInfo = connection_url(config).try_into()?;

        let client = FalkorClientBuilder::new_async()
            .with_connection_info(conn_info)
            .build()
            .await?;

        let graph = client.select_graph(&config.graph_name);

        Ok(Self {
            _client: client,
            graph,
        })
    }

    pub async fn ping(&mut self) -> Result<()> {
        let _result = self.graph.query("RETURN 1").execute().await?;
        Ok(())
    }

    pub async fn query(&mut self, query: &str, params: &Params) -> ExplorerResult<QueryResult> {
        let params = convert::cypher_params(params);
        let mut result = self
            .graph
            .query(query)
            .with_params(&params)
            .execute()
            .await
            .map_err(|e| ExplorerError::database(format!("Query failed: {e}")))?;

        let header = result.header.clone();
        let mut records = Vec::new();
        while let Some(row) = result.data.next() {
            records.push(convert::record(&header, row));
        }

        debug!("Query returned {} records", records.len());
        Ok(QueryResult::new(records))
    }
}

fn connection_url(config: &Config) -> String {
    format!("redis://{}:{}", config.falkor_host, config.falkor_port)
}

/// Runs `GRAPH.EXPLAIN` on the blocking client. The plan holds `Rc`s, so
/// only its text lines leave this function.
fn explain_blocking(
    client: &FalkorSyncClient,
    graph_name: &str,
    query: &str,
    params: &HashMap<String, String>,
) -> ExplorerResult<Vec<String>> {
    let mut graph = client.select_graph(graph_name);
    let plan = graph
        .explain(query)
        .with_params(params)
        .execute()
        .map_err(|e| ExplorerError::database(format!("Explain failed: {e}")))?;

    Ok(plan.plan().iter().map(|line| line.trim().to_string()).collect())
}

/// [`QueryExecutor`] over a pooled FalkorDB connection set.
///
/// Plans come from a separate blocking client, opened on first use, since
/// the async explain future is not `Send`.
#[derive(Clone)]
pub struct FalkorExecutor {
    pool: FalkorPool,
    url: String,
    graph_name: String,
    explain_client: Arc<OnceCell<Arc<FalkorSyncClient>>>,
}

impl FalkorExecutor {
    pub fn new(pool: FalkorPool, config: &Config) -> Self {
        Self {
            pool,
            url: connection_url(config),
            graph_name: config.graph_name.clone(),
            explain_client: Arc::new(OnceCell::new()),
        }
    }

    async fn explain_client(&self) -> ExplorerResult<Arc<FalkorSyncClient>> {
        let client = self
            .explain_client
            .get_or_try_init(|| {
                let url = self.url.clone();
                async move {
                    let client = tokio::task::spawn_blocking(move || {
                        let conn_info: FalkorConnectionInfo = url.as_str().try_into()?;
                        FalkorClientBuilder::new()
                            .with_connection_info(conn_info)
                            .with_num_connections(NonZeroU8::MIN)
                            .build()
                    })
                    .await
                    .map_err(|e| ExplorerError::Internal(e.into()))?
                    .map_err(|e| {
                        ExplorerError::database(format!("Failed to open explain connection: {e}"))
                    })?;
                    info!("Opened blocking FalkorDB connection for query plans");
                    Ok::<_, ExplorerError>(Arc::new(client))
                }
            })
            .await?;
        Ok(Arc::clone(client))
    }

    async fn connection(&self) -> ExplorerResult<super::FalkorConnection> {
        self.pool
            .get()
            .await
            .map_err(|e| ExplorerError::database(format!("Failed to get connection: {e}")))
    }
}

#[async_trait]
impl QueryExecutor for FalkorExecutor {
    #[instrument(skip(self, params))]
    async fn run(&self, query: &str, params: &Params) -> ExplorerResult<QueryResult> {
        let mut conn = self.connection().await?;
        conn.query(query, params).await
    }

    #[instrument(skip(self, params))]
    async fn explain(&self, query: &str, params: &Params) -> ExplorerResult<Vec<String>> {
        let client = self.explain_client().await?;
        let graph_name = self.graph_name.clone();
        let query = query.to_string();
        let params = convert::cypher_params(params);

        tokio::task::spawn_blocking(move || explain_blocking(&client, &graph_name, &query, &params))
            .await
            .map_err(|e| ExplorerError::Internal(e.into()))?
    }
}

use async_trait::async_trait;
use deadpool::managed::{Manager, Object, Pool, RecycleResult};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ExplorerError, ExplorerResult};

pub mod client;
pub mod convert;

pub use self::client::{FalkorExecutor, FalkorGraphClient};

pub type FalkorPool = Pool<FalkorManager>;
pub type FalkorConnection = Object<FalkorManager>;

pub struct FalkorManager {
    config: Arc<Config>,
}

impl FalkorManager {
    pub fn new(config: &Config) -> Self {
        Self {
            config: Arc::new(config.clone()),
        }
    }
}

#[async_trait]
impl Manager for FalkorManager {
    type Type = FalkorGraphClient;
    type Error = ExplorerError;

    async fn create(&self) -> Result<FalkorGraphClient, Self::Error> {
        debug!("Opening FalkorDB connection to graph {}", self.config.graph_name);
        FalkorGraphClient::new(&self.config)
            .await
            .map_err(|e| ExplorerError::database(format!("Failed to create connection: {e}")))
    }

    async fn recycle(
        &self,
        conn: &mut FalkorGraphClient,
        _metrics: &deadpool::managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        conn.ping()
            .await
            .map_err(|e| ExplorerError::database(format!("Connection ping failed: {e}")))?;
        Ok(())
    }
}

pub async fn create_falkor_pool(config: &Config) -> ExplorerResult<FalkorPool> {
    let manager = FalkorManager::new(config);

    let pool = Pool::builder(manager)
        .max_size(config.max_connections)
        .build()
        .map_err(|e| ExplorerError::database(format!("Failed to create pool: {e}")))?;

    // fail fast if the store is unreachable
    let conn = pool
        .get()
        .await
        .map_err(|e| ExplorerError::database(format!("Failed to get connection: {e}")))?;
    drop(conn);

    info!(
        "FalkorDB connection pool created with {} connections",
        config.max_connections
    );
    Ok(pool)
}

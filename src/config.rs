use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::culling::CullingConfig;
use crate::loader::LoaderConfig;
use crate::manager::ManagerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub falkor_host: String,
    pub falkor_port: u16,
    pub graph_name: String,
    pub max_connections: usize,
    pub query_timeout_ms: u64,
    pub cache_ttl: u64,
    pub neighbor_cache_ttl: u64,
    pub cache_sweep_interval: u64,
    pub cache_max_entries: usize,
    /// Seconds a session may go unused before it is evicted.
    pub session_idle_timeout: u64,
    pub max_sessions: usize,
    pub batch_size: usize,
    pub max_batches: usize,
    pub preload_threshold: usize,
    pub parallel_threshold: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3005".to_string())
                .parse()?,
            falkor_host: env::var("FALKORDB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            falkor_port: env::var("FALKORDB_PORT")
                .unwrap_or_else(|_| "6379".to_string())
                .parse()?,
            graph_name: env::var("GRAPH_NAME").unwrap_or_else(|_| "graph_explorer".to_string()),
            max_connections: env::var("MAX_CONNECTIONS")
                .unwrap_or_else(|_| "16".to_string())
                .parse()?,
            query_timeout_ms: env::var("QUERY_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()?,
            cache_ttl: env::var("CACHE_TTL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            neighbor_cache_ttl: env::var("NEIGHBOR_CACHE_TTL")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            cache_sweep_interval: env::var("CACHE_SWEEP_INTERVAL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            session_idle_timeout: env::var("SESSION_IDLE_TIMEOUT")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()?,
            max_sessions: env::var("MAX_SESSIONS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            batch_size: env::var("BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_batches: env::var("MAX_BATCHES")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            preload_threshold: env::var("PRELOAD_THRESHOLD")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            parallel_threshold: env::var("PARALLEL_THRESHOLD")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
        })
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            default_ttl: Duration::from_secs(self.cache_ttl),
            neighbor_ttl: Duration::from_secs(self.neighbor_cache_ttl),
            sweep_interval: Duration::from_secs(self.cache_sweep_interval),
            max_entries: self.cache_max_entries,
            loader: self.loader_config(),
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            batch_size: self.batch_size,
            max_batches: self.max_batches,
            preload_threshold: self.preload_threshold,
            ..LoaderConfig::default()
        }
    }

    pub fn culling_config(&self) -> CullingConfig {
        CullingConfig {
            parallel_threshold: self.parallel_threshold,
            ..CullingConfig::default()
        }
    }
}

//! HTTP surface: one [`LoaderManager`] per exploration session.

use axum::{
    routing::{delete, get, post},
    Router,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ExplorerError, ExplorerResult};
use crate::executor::QueryExecutor;
use crate::manager::LoaderManager;

pub mod handlers;

pub type SessionHandle = Arc<Mutex<LoaderManager<dyn QueryExecutor>>>;

pub struct Session {
    pub handle: SessionHandle,
    pub last_access: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn QueryExecutor>,
    pub sessions: Arc<DashMap<Uuid, Session>>,
    pub config: Config,
}

impl AppState {
    pub fn new(executor: Arc<dyn QueryExecutor>, config: Config) -> Self {
        Self {
            executor,
            sessions: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Registers a fresh session with its own loader and cache. A full
    /// registry is swept for idle sessions before the request is refused.
    pub fn open_session(&self) -> ExplorerResult<Uuid> {
        if self.sessions.len() >= self.config.max_sessions
            && (self.evict_idle() == 0 || self.sessions.len() >= self.config.max_sessions)
        {
            warn!("Session limit of {} reached", self.config.max_sessions);
            return Err(ExplorerError::TooManySessions(self.config.max_sessions));
        }

        let mut manager = LoaderManager::new(Arc::clone(&self.executor), self.config.manager_config());
        manager.start_expiry_sweep();
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            Session {
                handle: Arc::new(Mutex::new(manager)),
                last_access: Instant::now(),
            },
        );
        Ok(id)
    }

    /// Looks a session up and marks it as used.
    pub fn session(&self, id: Uuid) -> ExplorerResult<SessionHandle> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| ExplorerError::SessionNotFound(id.to_string()))?;
        session.last_access = Instant::now();
        Ok(Arc::clone(&session.handle))
    }

    pub fn close_session(&self, id: Uuid) -> ExplorerResult<()> {
        self.sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ExplorerError::SessionNotFound(id.to_string()))
    }

    /// Drops every session unused for longer than the idle timeout. Their
    /// managers abort their cache sweepers on drop.
    pub fn evict_idle(&self) -> usize {
        let idle = self.config.session_idle_timeout();
        let now = Instant::now();
        let mut evicted = 0;
        self.sessions.retain(|id, session| {
            let keep = now.duration_since(session.last_access) < idle;
            if !keep {
                debug!("Evicting idle session {}", id);
                evicted += 1;
            }
            keep
        });
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    /// Spawns the periodic idle-session sweep. Runs on the cache sweep
    /// interval; a zero interval leaves eviction to `open_session`.
    pub fn spawn_session_reaper(&self) -> Option<JoinHandle<()>> {
        let period = Duration::from_secs(self.config.cache_sweep_interval);
        if period.is_zero() {
            warn!("Sweep interval is zero, idle sessions are only evicted when the registry is full");
            return None;
        }

        let state = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                state.evict_idle();
            }
        }))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/:id", delete(handlers::delete_session))
        .route("/sessions/:id/initial", post(handlers::load_initial))
        .route("/sessions/:id/neighbors/:node_id", post(handlers::load_neighbors))
        .route("/sessions/:id/frontier", post(handlers::expand_frontier))
        .route("/sessions/:id/paginate", post(handlers::execute_paginated))
        .route("/sessions/:id/optimized", post(handlers::execute_optimized))
        .route("/sessions/:id/analyze", post(handlers::analyze_query))
        .route("/sessions/:id/progress", get(handlers::get_progress))
        .route("/sessions/:id/cache/clear", post(handlers::clear_cache))
        .route(
            "/indexes",
            get(handlers::list_indexes).post(handlers::create_index),
        )
        .route("/render", post(handlers::render))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, FmtSubscriber};

use graph_explorer::config::Config;
use graph_explorer::executor::{Deadline, QueryExecutor};
use graph_explorer::falkor::{create_falkor_pool, FalkorExecutor};
use graph_explorer::server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("graph_explorer=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting graph explorer service");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: graph {} at {}:{}",
        config.graph_name, config.falkor_host, config.falkor_port
    );

    let pool = create_falkor_pool(&config).await?;
    let executor: Arc<dyn QueryExecutor> =
        Arc::new(Deadline::new(FalkorExecutor::new(pool, &config), config.query_timeout()));

    let state = AppState::new(executor, config.clone());
    let _reaper = state.spawn_session_reaper();
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub mod cache;
pub mod config;
pub mod culling;
pub mod error;
pub mod executor;
pub mod falkor;
pub mod loader;
pub mod lod;
pub mod manager;
pub mod models;
pub mod optimizer;
pub mod queries;
pub mod sanitizer;
pub mod server;

pub use crate::error::{ExplorerError, ExplorerResult};
pub use crate::executor::{Deadline, QueryExecutor};
pub use crate::loader::IncrementalLoader;
pub use crate::manager::LoaderManager;
pub use crate::models::{GraphData, GraphEdge, GraphNode};
pub use crate::server::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Query timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session limit of {0} reached")]
    TooManySessions(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ExplorerError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl IntoResponse for ExplorerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ExplorerError::InvalidQuery(msg) | ExplorerError::InvalidConfig(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            ExplorerError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Unknown session {id}"))
            }
            ExplorerError::TooManySessions(_) => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ExplorerError::Database(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ExplorerError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type ExplorerResult<T> = Result<T, ExplorerError>;

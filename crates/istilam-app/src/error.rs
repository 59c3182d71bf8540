//! Application-level error type shared across subcommands.

use thiserror::Error;

use crate::browser::BrowserError;
use crate::config::AppConfigError;
use crate::query::QueryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] AppConfigError),
    #[error(transparent)]
    Server(#[from] istilam_server::ServerError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

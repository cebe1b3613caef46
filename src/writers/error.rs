use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to create output '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to build or write table '{0}'")]
    Polars(PathBuf, #[source] polars::prelude::PolarsError),

    #[error("Failed to serialize dataset attributes")]
    Json(#[from] serde_json::Error),
}

use crate::acquisition::error::FetchError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("Invalid station id '{0}', expected alphanumeric USAF and WBAN codes")]
    InvalidId(String),

    #[error("Malformed station history row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Failed to read station history '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write station history '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to download the station history")]
    Fetch(#[from] FetchError),
}

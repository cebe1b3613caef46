use crate::acquisition::error::FetchError;
use crate::observations::error::{ConsolidationError, DecodeError};
use crate::remote::error::RemoteError;
use crate::stations::error::StationError;
use crate::writers::error::WriteError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IsdLiteError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),

    #[error(transparent)]
    Station(#[from] StationError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Background task failed")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),
}

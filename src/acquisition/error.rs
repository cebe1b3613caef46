use crate::remote::error::RemoteError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No version tag for {url}, the resource probably does not exist at this URL")]
    ResourceNotFound { url: String },

    #[error("Version tag check failed for {url}")]
    MetadataRequest {
        url: String,
        #[source]
        source: RemoteError,
    },

    #[error("Transfer failed for {url}")]
    TransferFailed {
        url: String,
        #[source]
        source: RemoteError,
    },

    #[error("Cache I/O failed for '{0}'")]
    CacheIo(PathBuf, #[source] std::io::Error),

    #[error("Fetch of {url} cancelled")]
    Cancelled { url: String },

    #[error("Got {urls} URLs but {paths} local paths")]
    InconsistentInput { urls: usize, paths: usize },
}

impl FetchError {
    /// The URL the error concerns, if it concerns a single resource.
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::ResourceNotFound { url }
            | FetchError::MetadataRequest { url, .. }
            | FetchError::TransferFailed { url, .. }
            | FetchError::Cancelled { url } => Some(url),
            FetchError::CacheIo(..) | FetchError::InconsistentInput { .. } => None,
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Response body stream failed for {url}")]
    BodyStream {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

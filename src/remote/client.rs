//! The network seam: the [`RemoteSource`] trait and its `reqwest` implementation.

use crate::remote::error::RemoteError;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use log::{debug, warn};
use reqwest::header::{HeaderMap, CONTENT_TYPE, ETAG};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed stream of response body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, RemoteError>> + Send>>;

/// The remote operations the acquisition layer needs from the archive server.
///
/// Every call is independent and carries its own timeout; implementations must be
/// safe to share between concurrently running fetches.
pub trait RemoteSource: Send + Sync {
    /// Returns the version tag (`ETag`) of the resource, or `None` if the server
    /// reports none, which is taken to mean the resource does not exist.
    fn version_tag(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<String>, RemoteError>> + Send;

    /// Lightweight existence check for a resource.
    fn exists(&self, url: &str) -> impl Future<Output = Result<bool, RemoteError>> + Send;

    /// Opens the resource body as a stream. A non-success status is an error.
    fn body(&self, url: &str) -> impl Future<Output = Result<BodyStream, RemoteError>> + Send;

    /// Fetches an HTML directory listing. Returns `None` if the server answers with a
    /// non-success status or with content that is not an HTML listing.
    fn listing(&self, url: &str)
        -> impl Future<Output = Result<Option<String>, RemoteError>> + Send;
}

/// [`RemoteSource`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
}

impl HttpRemote {
    /// Creates a remote whose every request carries `timeout` and `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::ClientBuild`] if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(user_agent)
            .build()
            .map_err(RemoteError::ClientBuild)?;
        Ok(Self { client })
    }

    async fn send_head(&self, url: &str) -> Result<reqwest::Response, RemoteError> {
        self.client
            .head(url)
            .send()
            .await
            .map_err(|e| RemoteError::NetworkRequest(url.to_string(), e))
    }
}

/// The version tag carried by a HEAD response.
///
/// A non-success status, a missing `ETag` header or one that is not valid text all
/// yield `None`, which callers read as "resource does not exist".
pub(crate) fn version_tag_of(status: StatusCode, headers: &HeaderMap) -> Option<String> {
    if !status.is_success() {
        return None;
    }
    headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Whether a directory listing response can be parsed: status below 400 and an
/// HTML content type.
pub(crate) fn is_html_listing(status: StatusCode, headers: &HeaderMap) -> bool {
    let is_html = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/html"));
    status.as_u16() < 400 && is_html
}

impl RemoteSource for HttpRemote {
    async fn version_tag(&self, url: &str) -> Result<Option<String>, RemoteError> {
        let response = self.send_head(url).await?;
        let tag = version_tag_of(response.status(), response.headers());
        if tag.is_none() {
            debug!("HEAD {} answered {} without a usable ETag", url, response.status());
        }
        Ok(tag)
    }

    async fn exists(&self, url: &str) -> Result<bool, RemoteError> {
        Ok(self.send_head(url).await?.status().is_success())
    }

    async fn body(&self, url: &str) -> Result<BodyStream, RemoteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::NetworkRequest(url.to_string(), e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP error for {}: {}", url, status);
            return Err(RemoteError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let owned_url = url.to_string();
        let stream = response.bytes_stream().map_err(move |e| RemoteError::BodyStream {
            url: owned_url.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        });
        Ok(Box::pin(stream))
    }

    async fn listing(&self, url: &str) -> Result<Option<String>, RemoteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::NetworkRequest(url.to_string(), e))?;

        if !is_html_listing(response.status(), response.headers()) {
            debug!(
                "Listing {} unusable (status {}, content type {:?})",
                url,
                response.status(),
                response.headers().get(CONTENT_TYPE)
            );
            return Ok(None);
        }

        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::NetworkRequest(url.to_string(), e))?;
        Ok(Some(text))
    }
}

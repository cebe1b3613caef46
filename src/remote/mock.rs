//! In-memory [`RemoteSource`] used by unit tests.

use crate::remote::client::{BodyStream, RemoteSource};
use crate::remote::error::RemoteError;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct MockResource {
    pub etag: Option<String>,
    pub body: Vec<u8>,
    /// Body request answers with HTTP 503.
    pub fail_status: bool,
    /// Body stream breaks after the first chunk.
    pub interrupt: bool,
}

#[derive(Debug, Default)]
pub(crate) struct MockRemote {
    resources: Mutex<HashMap<String, MockResource>>,
    listings: Mutex<HashMap<String, String>>,
    body_calls: Mutex<HashMap<String, usize>>,
    /// URLs whose existence check errors.
    failing_exists: Mutex<HashSet<String>>,
    /// URLs whose listing request errors.
    failing_listings: Mutex<HashSet<String>>,
    listing_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Option<Duration>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn put(&self, url: &str, etag: &str, body: &[u8]) {
        self.insert(
            url,
            MockResource {
                etag: Some(etag.to_string()),
                body: body.to_vec(),
                fail_status: false,
                interrupt: false,
            },
        );
    }

    pub fn insert(&self, url: &str, resource: MockResource) {
        self.resources
            .lock()
            .unwrap()
            .insert(url.to_string(), resource);
    }

    pub fn update(&self, url: &str, f: impl FnOnce(&mut MockResource)) {
        if let Some(r) = self.resources.lock().unwrap().get_mut(url) {
            f(r);
        }
    }

    pub fn put_listing(&self, url: &str, html: &str) {
        self.listings
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    /// Makes `exists(url)` fail with a transport-level error.
    pub fn fail_exists(&self, url: &str) {
        self.failing_exists.lock().unwrap().insert(url.to_string());
    }

    /// Makes `listing(url)` fail with a transport-level error.
    pub fn fail_listing(&self, url: &str) {
        self.failing_listings
            .lock()
            .unwrap()
            .insert(url.to_string());
    }

    pub fn body_calls(&self, url: &str) -> usize {
        self.body_calls
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_body_calls(&self) -> usize {
        self.body_calls.lock().unwrap().values().sum()
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn unavailable(url: &str) -> RemoteError {
        RemoteError::HttpStatus {
            url: url.to_string(),
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn resource(&self, url: &str) -> Option<MockResource> {
        self.resources.lock().unwrap().get(url).cloned()
    }
}

impl RemoteSource for MockRemote {
    async fn version_tag(&self, url: &str) -> Result<Option<String>, RemoteError> {
        self.simulate_latency().await;
        Ok(self.resource(url).and_then(|r| r.etag))
    }

    async fn exists(&self, url: &str) -> Result<bool, RemoteError> {
        self.simulate_latency().await;
        if self.failing_exists.lock().unwrap().contains(url) {
            return Err(Self::unavailable(url));
        }
        Ok(self.resource(url).is_some())
    }

    async fn body(&self, url: &str) -> Result<BodyStream, RemoteError> {
        *self
            .body_calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;
        let Some(resource) = self.resource(url) else {
            return Err(RemoteError::HttpStatus {
                url: url.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            });
        };
        if resource.fail_status {
            return Err(Self::unavailable(url));
        }

        let half = resource.body.len() / 2;
        let mut chunks = vec![Ok(Bytes::copy_from_slice(&resource.body[..half]))];
        if resource.interrupt {
            chunks.push(Err(RemoteError::BodyStream {
                url: url.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
            }));
        } else {
            chunks.push(Ok(Bytes::copy_from_slice(&resource.body[half..])));
        }
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }

    async fn listing(&self, url: &str) -> Result<Option<String>, RemoteError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_listings.lock().unwrap().contains(url) {
            return Err(Self::unavailable(url));
        }
        Ok(self.listings.lock().unwrap().get(url).cloned())
    }
}

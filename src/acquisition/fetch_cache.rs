//! Conditional download of a single remote resource into the local cache.
//!
//! A cached payload `X` is accompanied by a sidecar `X.tag` holding the remote
//! version tag seen at the last successful fetch. The sidecar is written only after
//! the payload is completely in place, and removed before a new transfer starts, so
//! its presence always implies a complete payload.

use crate::acquisition::error::FetchError;
use crate::remote::client::RemoteSource;
use crate::utils::decision_level;
use futures_util::StreamExt;
use log::log;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Suffix appended to a cached file name to form its sidecar.
pub const TAG_SUFFIX: &str = ".tag";

/// Why a resource was transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadReason {
    /// No complete local copy (payload or sidecar missing).
    NotCached,
    /// The stored tag differs from the remote tag.
    TagChanged,
    /// Re-fetch requested by the caller.
    Forced,
}

/// What a fetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The body was transferred and the sidecar updated.
    Downloaded(DownloadReason),
    /// The local copy matches the remote tag; nothing was transferred.
    Skipped,
}

impl FetchOutcome {
    /// Whether the body was transferred.
    pub fn is_downloaded(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded(_))
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Downloaded(DownloadReason::NotCached) => write!(f, "downloaded"),
            FetchOutcome::Downloaded(DownloadReason::TagChanged) => {
                write!(f, "downloaded (tag differs from local copy)")
            }
            FetchOutcome::Downloaded(DownloadReason::Forced) => write!(f, "downloaded (forced)"),
            FetchOutcome::Skipped => write!(f, "skipped (tag matches local copy)"),
        }
    }
}

/// Returns the sidecar path of a cached payload.
pub fn tag_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(TAG_SUFFIX);
    PathBuf::from(name)
}

/// A cached payload and its sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub tag_path: PathBuf,
}

impl CacheEntry {
    /// The entry for the payload at `path` and its sidecar.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            tag_path: tag_path(path),
        }
    }

    /// The stored tag, or `None` if the entry is not completely cached.
    pub async fn stored_tag(&self) -> Result<Option<String>, FetchError> {
        if !exists(&self.path).await? {
            return Ok(None);
        }
        match fs::read_to_string(&self.tag_path).await {
            Ok(tag) => Ok(Some(tag.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FetchError::CacheIo(self.tag_path.clone(), e)),
        }
    }

    /// Whether both payload and sidecar are present.
    pub async fn is_complete(&self) -> Result<bool, FetchError> {
        Ok(exists(&self.path).await? && exists(&self.tag_path).await?)
    }
}

async fn exists(path: &Path) -> Result<bool, FetchError> {
    fs::try_exists(path)
        .await
        .map_err(|e| FetchError::CacheIo(path.to_path_buf(), e))
}

/// Fetches resources only when their remote version tag differs from the cached one.
#[derive(Debug)]
pub struct ConditionalFetchCache<R> {
    remote: Arc<R>,
    verbose: bool,
}

impl<R> Clone for ConditionalFetchCache<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            verbose: self.verbose,
        }
    }
}

impl<R: RemoteSource> ConditionalFetchCache<R> {
    /// Creates a cache on top of `remote`.
    ///
    /// # Arguments
    ///
    /// * `remote` - The [`RemoteSource`] to query tags and bodies from.
    /// * `verbose` - Log every download/skip decision at `info` instead of `debug`.
    pub fn new(remote: Arc<R>, verbose: bool) -> Self {
        Self { remote, verbose }
    }

    /// Fetches `url` into `path` unless the cached copy is current.
    ///
    /// The remote tag is always requested first. Without `force`, a complete cache
    /// entry whose stored tag equals the remote tag is left untouched.
    ///
    /// # Errors
    ///
    /// * [`FetchError::ResourceNotFound`] if the server reports no tag.
    /// * [`FetchError::MetadataRequest`] if the tag request itself fails.
    /// * [`FetchError::TransferFailed`] if the body request fails, answers with a
    ///   non-success status, or breaks off mid-stream.
    /// * [`FetchError::CacheIo`] for local file system errors.
    pub async fn fetch(
        &self,
        url: &str,
        path: &Path,
        force: bool,
    ) -> Result<FetchOutcome, FetchError> {
        let remote_tag = match self.remote.version_tag(url).await {
            Ok(Some(tag)) => tag,
            Ok(None) => {
                return Err(FetchError::ResourceNotFound {
                    url: url.to_string(),
                })
            }
            Err(source) => {
                return Err(FetchError::MetadataRequest {
                    url: url.to_string(),
                    source,
                })
            }
        };

        let entry = CacheEntry::new(path);
        let reason = if force {
            DownloadReason::Forced
        } else {
            match entry.stored_tag().await? {
                Some(local_tag) if local_tag == remote_tag => {
                    log!(
                        decision_level(self.verbose),
                        "{} available locally as {} and tag matches tag online. Skipping download.",
                        url,
                        path.display()
                    );
                    return Ok(FetchOutcome::Skipped);
                }
                Some(_) => {
                    log!(
                        decision_level(self.verbose),
                        "{} available locally as {} and tag differs from tag online. Proceeding to download.",
                        url,
                        path.display()
                    );
                    DownloadReason::TagChanged
                }
                None => DownloadReason::NotCached,
            }
        };

        let bytes = self.transfer(url, &entry, &remote_tag).await?;
        log!(
            decision_level(self.verbose),
            "{} downloaded ({} bytes).",
            url,
            bytes
        );
        Ok(FetchOutcome::Downloaded(reason))
    }

    /// Streams the body into a temporary file next to the target, moves it into
    /// place, then records the tag.
    async fn transfer(
        &self,
        url: &str,
        entry: &CacheEntry,
        remote_tag: &str,
    ) -> Result<u64, FetchError> {
        let dir = match entry.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| FetchError::CacheIo(dir.clone(), e))?;

        match fs::remove_file(&entry.tag_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FetchError::CacheIo(entry.tag_path.clone(), e)),
        }

        let (std_file, temp_path) = NamedTempFile::new_in(&dir)
            .map_err(|e| FetchError::CacheIo(dir.clone(), e))?
            .into_parts();
        let mut file = fs::File::from_std(std_file);
        let temp_io = |e: io::Error| FetchError::CacheIo(temp_path.to_path_buf(), e);

        let mut stream = self
            .remote
            .body(url)
            .await
            .map_err(|source| FetchError::TransferFailed {
                url: url.to_string(),
                source,
            })?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::TransferFailed {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).await.map_err(temp_io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(temp_io)?;
        file.sync_all().await.map_err(temp_io)?;
        drop(file);

        temp_path
            .persist(&entry.path)
            .map_err(|e| FetchError::CacheIo(entry.path.clone(), e.error))?;

        fs::write(&entry.tag_path, remote_tag)
            .await
            .map_err(|e| FetchError::CacheIo(entry.tag_path.clone(), e))?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::{MockRemote, MockResource};
    use tempfile::TempDir;

    const URL: &str = "https://example.org/isd-lite/2020/010010-99999-2020.gz";

    fn setup() -> (Arc<MockRemote>, ConditionalFetchCache<MockRemote>, TempDir) {
        let remote = Arc::new(MockRemote::new());
        remote.put(URL, "\"etag-1\"", b"2020 01 01 00 10 20 30 40 50 60 70 80\n");
        let cache = ConditionalFetchCache::new(Arc::clone(&remote), true);
        (remote, cache, TempDir::new().unwrap())
    }

    #[tokio::test]
    async fn test_second_fetch_is_skipped() {
        let (remote, cache, dir) = setup();
        let path = dir.path().join("010010-99999-2020.gz");

        let first = cache.fetch(URL, &path, false).await.unwrap();
        let second = cache.fetch(URL, &path, false).await.unwrap();

        assert_eq!(first, FetchOutcome::Downloaded(DownloadReason::NotCached));
        assert_eq!(second, FetchOutcome::Skipped);
        assert_eq!(remote.body_calls(URL), 1);
        assert_eq!(
            std::fs::read_to_string(tag_path(&path)).unwrap(),
            "\"etag-1\""
        );
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"2020 01 01 00 10 20 30 40 50 60 70 80\n"
        );
    }

    #[tokio::test]
    async fn test_force_transfers_with_unchanged_tag() {
        let (remote, cache, dir) = setup();
        let path = dir.path().join("f.gz");

        cache.fetch(URL, &path, false).await.unwrap();
        let forced = cache.fetch(URL, &path, true).await.unwrap();

        assert_eq!(forced, FetchOutcome::Downloaded(DownloadReason::Forced));
        assert_eq!(remote.body_calls(URL), 2);
    }

    #[tokio::test]
    async fn test_changed_tag_triggers_download() {
        let (remote, cache, dir) = setup();
        let path = dir.path().join("f.gz");

        cache.fetch(URL, &path, false).await.unwrap();
        remote.update(URL, |r| {
            r.etag = Some("\"etag-2\"".to_string());
            r.body = b"new".to_vec();
        });
        let outcome = cache.fetch(URL, &path, false).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded(DownloadReason::TagChanged));
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert_eq!(
            std::fs::read_to_string(tag_path(&path)).unwrap(),
            "\"etag-2\""
        );
    }

    #[tokio::test]
    async fn test_payload_without_sidecar_is_refetched() {
        let (remote, cache, dir) = setup();
        let path = dir.path().join("f.gz");
        std::fs::write(&path, b"stale but unverified").unwrap();

        let outcome = cache.fetch(URL, &path, false).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded(DownloadReason::NotCached));
        assert_eq!(remote.body_calls(URL), 1);
    }

    #[tokio::test]
    async fn test_interrupted_transfer_leaves_no_sidecar() {
        let (remote, cache, dir) = setup();
        let path = dir.path().join("f.gz");
        cache.fetch(URL, &path, false).await.unwrap();

        remote.update(URL, |r| {
            r.etag = Some("\"etag-2\"".to_string());
            r.interrupt = true;
        });
        let err = cache.fetch(URL, &path, false).await.unwrap_err();
        assert!(matches!(err, FetchError::TransferFailed { .. }));
        assert!(!tag_path(&path).exists());

        // The next call retries rather than trusting whatever is on disk.
        remote.update(URL, |r| r.interrupt = false);
        let outcome = cache.fetch(URL, &path, false).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Downloaded(DownloadReason::NotCached));
        assert_eq!(remote.body_calls(URL), 3);
        assert!(tag_path(&path).exists());
    }

    #[tokio::test]
    async fn test_missing_tag_is_resource_not_found() {
        let (remote, cache, dir) = setup();
        remote.insert(
            "https://example.org/untagged.gz",
            MockResource {
                etag: None,
                body: Vec::new(),
                fail_status: false,
                interrupt: false,
            },
        );

        let path = dir.path().join("missing.gz");
        let err = cache
            .fetch("https://example.org/nothing.gz", &path, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ResourceNotFound { .. }));

        let err = cache
            .fetch("https://example.org/untagged.gz", &path, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ResourceNotFound { .. }));
        assert!(!path.exists());
        assert_eq!(remote.total_body_calls(), 0);
    }

    #[tokio::test]
    async fn test_error_status_on_body_is_transfer_failure() {
        let (remote, cache, dir) = setup();
        remote.update(URL, |r| r.fail_status = true);
        let path = dir.path().join("f.gz");

        let err = cache.fetch(URL, &path, false).await.unwrap_err();

        assert!(matches!(err, FetchError::TransferFailed { .. }));
        assert_eq!(err.url(), Some(URL));
        assert!(!path.exists());
        assert!(!tag_path(&path).exists());
    }

    #[tokio::test]
    async fn test_creates_missing_cache_directory() {
        let (_remote, cache, dir) = setup();
        let path = dir.path().join("nested").join("deeper").join("f.gz");

        cache.fetch(URL, &path, false).await.unwrap();

        assert!(CacheEntry::new(&path).is_complete().await.unwrap());
    }
}

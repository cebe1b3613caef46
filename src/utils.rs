use log::{info, Level};
use std::io;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "isd_lite_cache";

/// Returns the default cache directory, `isd_lite_cache` inside the platform cache dir.
///
/// # Errors
///
/// Returns an [`io::Error`] of kind `NotFound` if the platform has no cache directory.
pub fn get_cache_dir() -> io::Result<PathBuf> {
    dirs::cache_dir()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system cache directory",
            )
        })
        .map(|p| p.join(CACHE_DIR_NAME))
}

/// Creates `path` (and its parents) if it does not exist yet.
///
/// # Errors
///
/// Fails if `path` exists but is not a directory, or if it cannot be created.
pub async fn ensure_cache_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Cache path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating cache directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

/// Log level for per-unit decisions (download/skip, include/exclude).
pub(crate) fn decision_level(verbose: bool) -> Level {
    if verbose {
        Level::Info
    } else {
        Level::Debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_cache_dir_creates_and_accepts_existing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b");
        ensure_cache_dir_exists(&target).await.unwrap();
        assert!(target.is_dir());
        ensure_cache_dir_exists(&target).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_cache_dir_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_cache_dir_exists(&file).await.is_err());
    }
}

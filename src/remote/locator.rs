//! ISD-Lite URL and cache file name construction.

use crate::types::station_id::StationId;
use std::path::{Path, PathBuf};

/// Base URL of the ISD-Lite archive tree.
pub const DEFAULT_BASE_URL: &str = "https://www.ncei.noaa.gov/pub/data/noaa/isd-lite";

/// Integrated Surface Database station history (station metadata) file.
pub const DEFAULT_STATIONS_URL: &str = "https://www.ncei.noaa.gov/pub/data/noaa/isd-history.txt";

/// Extension of the (gzip compressed) archive files.
pub const ARCHIVE_EXTENSION: &str = "gz";

/// Maps `(year, station)` to remote archive URLs and local cache file names.
///
/// URL format: `{base}/{year}/{USAF}-{WBAN}-{year}.gz`. The local cache mirrors the
/// leaf file name under a caller-chosen directory.
///
/// # Example
///
/// ```
/// use isd_lite::{ResourceLocator, StationId};
///
/// let locator = ResourceLocator::new("https://www.ncei.noaa.gov/pub/data/noaa/isd-lite/");
/// let id = StationId::new("010010", "99999").unwrap();
/// assert_eq!(
///     locator.data_url(2020, &id),
///     "https://www.ncei.noaa.gov/pub/data/noaa/isd-lite/2020/010010-99999-2020.gz"
/// );
/// assert_eq!(ResourceLocator::file_name(2020, &id), "010010-99999-2020.gz");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    base_url: String,
}

impl ResourceLocator {
    /// Creates a locator for the archive tree at `base_url`; a trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Name of the archive file for a station and year.
    #[must_use]
    pub fn file_name(year: i32, station: &StationId) -> String {
        format!(
            "{}-{}-{}.{}",
            station.usaf(),
            station.wban(),
            year,
            ARCHIVE_EXTENSION
        )
    }

    /// Remote URL of the archive file for a station and year.
    #[must_use]
    pub fn data_url(&self, year: i32, station: &StationId) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            year,
            Self::file_name(year, station)
        )
    }

    /// URL of the directory listing holding all archives of a year (trailing slash included).
    #[must_use]
    pub fn year_directory(&self, year: i32) -> String {
        format!("{}/{}/", self.base_url, year)
    }

    /// Local cache path of the archive file for a station and year.
    #[must_use]
    pub fn local_path(dir: &Path, year: i32, station: &StationId) -> PathBuf {
        dir.join(Self::file_name(year, station))
    }
}

impl Default for ResourceLocator {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_file_name_contains_codes_and_year() {
        let id = StationId::new("A00001", "00123").unwrap();
        let name = ResourceLocator::file_name(1999, &id);
        assert_eq!(name, "A00001-00123-1999.gz");
        assert!(name.contains(id.usaf()));
        assert!(name.contains(id.wban()));
        assert!(name.contains("1999"));
    }

    #[test]
    fn test_distinct_keys_never_collide() {
        let ids = [
            StationId::new("724670", "03017").unwrap(),
            StationId::new("72467", "003017").unwrap(),
            StationId::new("724670", "99999").unwrap(),
            StationId::new("999999", "03017").unwrap(),
        ];
        let mut seen = HashSet::new();
        for year in 2019..=2022 {
            for id in &ids {
                assert!(seen.insert(ResourceLocator::file_name(year, id)));
            }
        }
        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn test_trailing_slash_is_normalised() {
        let id = StationId::new("010010", "99999").unwrap();
        let a = ResourceLocator::new("https://example.org/isd-lite/");
        let b = ResourceLocator::new("https://example.org/isd-lite");
        assert_eq!(a.data_url(2021, &id), b.data_url(2021, &id));
        assert_eq!(a.year_directory(2021), "https://example.org/isd-lite/2021/");
    }

    #[test]
    fn test_local_path_mirrors_leaf_name() {
        let id = StationId::new("010010", "99999").unwrap();
        let path = ResourceLocator::local_path(Path::new("/tmp/cache"), 2020, &id);
        assert_eq!(path, PathBuf::from("/tmp/cache/010010-99999-2020.gz"));
    }
}

//! This module provides the main entry point of the crate: the [`IsdLite`] client,
//! which ties the station catalog, availability probing, cached downloads, decoding
//! and consolidation together, and its [`IsdLiteConfig`].

use crate::acquisition::fetch_cache::ConditionalFetchCache;
use crate::acquisition::probe::{AvailabilityProbe, ProbeDecision, ProbeMode};
use crate::acquisition::scheduler::{BatchReport, DownloadScheduler, DEFAULT_CONCURRENCY};
use crate::error::IsdLiteError;
use crate::observations::consolidate::ConsolidationEngine;
use crate::observations::decoder::{ObservationDecoder, DEFAULT_MISSING_VALUE};
use crate::remote::client::{HttpRemote, RemoteSource};
use crate::remote::locator::{ResourceLocator, DEFAULT_BASE_URL, DEFAULT_STATIONS_URL};
use crate::stations::error::StationError;
use crate::stations::history::StationCatalog;
use crate::types::dataset::{ConsolidatedDataset, GlobalAttributes};
use crate::types::station::Station;
use crate::types::station_id::StationId;
use crate::types::year_range::YearRange;
use crate::utils::{decision_level, ensure_cache_dir_exists, get_cache_dir};
use crate::writers::parquet_writer::{DatasetWriter, ParquetDatasetWriter};
use bon::{bon, Builder};
use futures_util::{stream, StreamExt, TryStreamExt};
use log::{info, log, warn};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// File name of the cached station history inside the cache directory.
pub const STATIONS_FILE_NAME: &str = "isd-history.txt";

/// User agent sent with every request unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = concat!("isd-lite/", env!("CARGO_PKG_VERSION"));

/// Settings of an [`IsdLite`] client.
///
/// All fields have defaults, so `IsdLiteConfig::builder().build()` yields a client
/// pointing at the public NCEI archive with the platform cache directory.
///
/// # Examples
///
/// ```
/// use isd_lite::IsdLiteConfig;
/// use std::time::Duration;
///
/// let config = IsdLiteConfig::builder()
///     .cache_dir("/tmp/isd-lite")
///     .concurrency(4)
///     .timeout(Duration::from_secs(60))
///     .verbose(true)
///     .build();
/// assert_eq!(config.concurrency, 4);
/// assert_eq!(config.missing_value, -9999);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct IsdLiteConfig {
    /// Root of the archive tree; per-year directories live below it.
    #[builder(default = DEFAULT_BASE_URL.to_string(), into)]
    pub base_url: String,
    /// URL of the station history table.
    #[builder(default = DEFAULT_STATIONS_URL.to_string(), into)]
    pub stations_url: String,
    /// Directory for archives and the station history. Defaults to the platform
    /// cache directory.
    #[builder(into)]
    pub cache_dir: Option<PathBuf>,
    /// Maximum number of concurrent network requests per batch.
    #[builder(default = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Timeout of every single request.
    #[builder(default = Duration::from_secs(20))]
    pub timeout: Duration,
    #[builder(default = DEFAULT_USER_AGENT.to_string(), into)]
    pub user_agent: String,
    /// Raw value marking missing readings in the archives.
    #[builder(default = DEFAULT_MISSING_VALUE)]
    pub missing_value: i64,
    /// Log every per-station and per-file decision at `info` instead of `debug`.
    #[builder(default)]
    pub verbose: bool,
}

impl Default for IsdLiteConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Stations that passed an availability probe, with the decision for every candidate.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub available: StationCatalog,
    pub decisions: Vec<ProbeDecision>,
}

/// Everything [`IsdLite::build_dataset`] produced and decided.
#[derive(Debug)]
pub struct DatasetBuild {
    pub dataset: ConsolidatedDataset,
    /// Availability decision per candidate station.
    pub decisions: Vec<ProbeDecision>,
    /// Download report per year. Empty when built offline.
    pub downloads: Vec<(i32, BatchReport)>,
    /// Available stations left out because at least one archive failed to download.
    pub dropped: Vec<StationId>,
}

/// The main client for acquiring and consolidating ISD-Lite observations.
///
/// Archives are cached under the configured cache directory and only re-downloaded
/// when their remote version tag changes. The remote is generic so that the whole
/// workflow can run against any [`RemoteSource`]; [`HttpRemote`] is the default.
#[derive(Debug)]
pub struct IsdLite<R = HttpRemote> {
    config: IsdLiteConfig,
    cache_dir: PathBuf,
    remote: Arc<R>,
    locator: ResourceLocator,
}

impl IsdLite<HttpRemote> {
    /// Creates a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IsdLiteError::CacheDirResolution`] if the platform cache directory is
    /// unknown, [`IsdLiteError::CacheDirCreation`] if it cannot be created and
    /// [`IsdLiteError::Remote`] if the HTTP client cannot be built.
    pub async fn new() -> Result<Self, IsdLiteError> {
        Self::with_config(IsdLiteConfig::default()).await
    }

    /// Creates a client with default settings that caches into `cache_folder`.
    pub async fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, IsdLiteError> {
        Self::with_config(IsdLiteConfig::builder().cache_dir(cache_folder).build()).await
    }

    /// Creates a client talking HTTP with the given configuration.
    pub async fn with_config(config: IsdLiteConfig) -> Result<Self, IsdLiteError> {
        let remote = HttpRemote::new(config.timeout, &config.user_agent)?;
        Self::with_remote(config, Arc::new(remote)).await
    }
}

#[bon]
impl<R: RemoteSource> IsdLite<R> {
    /// Creates a client on top of an arbitrary [`RemoteSource`].
    pub async fn with_remote(config: IsdLiteConfig, remote: Arc<R>) -> Result<Self, IsdLiteError> {
        let cache_dir = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => get_cache_dir().map_err(IsdLiteError::CacheDirResolution)?,
        };
        ensure_cache_dir_exists(&cache_dir)
            .await
            .map_err(|e| IsdLiteError::CacheDirCreation(cache_dir.clone(), e))?;
        Ok(Self {
            locator: ResourceLocator::new(config.base_url.as_str()),
            config,
            cache_dir,
            remote,
        })
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &IsdLiteConfig {
        &self.config
    }

    /// Directory holding cached archives and the station history.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Maps stations and years to archive URLs under the configured base URL.
    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    fn fetch_cache(&self) -> ConditionalFetchCache<R> {
        ConditionalFetchCache::new(Arc::clone(&self.remote), self.config.verbose)
    }

    /// An availability probe sharing this client's remote and locator.
    pub fn probe(&self, mode: ProbeMode) -> AvailabilityProbe<R> {
        AvailabilityProbe::new(
            Arc::clone(&self.remote),
            self.locator.clone(),
            mode,
            self.config.verbose,
        )
    }

    /// A download scheduler sharing this client's remote and concurrency.
    pub fn scheduler(&self) -> DownloadScheduler<R> {
        DownloadScheduler::new(self.fetch_cache(), Some(self.config.concurrency))
    }

    /// Loads the station history table.
    ///
    /// Unless `offline` is set, the table is first refreshed through the conditional
    /// cache, so it is only transferred when its remote tag changed (or `force` is
    /// set). Offline, the cached copy is read as is.
    ///
    /// # Errors
    ///
    /// Returns [`IsdLiteError::Station`] if the download fails or the cached table
    /// cannot be read or parsed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use isd_lite::{IsdLite, IsdLiteError};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), IsdLiteError> {
    /// let client = IsdLite::new().await?;
    /// let swiss = client.station_catalog().call().await?.filter_by_country(&["SZ"]);
    /// println!("{} Swiss stations", swiss.len());
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn station_catalog(
        &self,
        offline: Option<bool>,
        force: Option<bool>,
    ) -> Result<StationCatalog, IsdLiteError> {
        let path = self.cache_dir.join(STATIONS_FILE_NAME);
        if !offline.unwrap_or(false) {
            let outcome = self
                .fetch_cache()
                .fetch(&self.config.stations_url, &path, force.unwrap_or(false))
                .await
                .map_err(StationError::from)?;
            log!(
                decision_level(self.config.verbose),
                "Station history {}",
                outcome
            );
        }
        Ok(StationCatalog::from_file(&path).await?)
    }

    /// Keeps the stations of `catalog` whose archives exist for every year of `years`.
    ///
    /// `mode` defaults to [`ProbeMode::Bulk`], which reads each year's directory
    /// listing once instead of checking every file.
    #[builder]
    pub async fn filter_available(
        &self,
        catalog: &StationCatalog,
        years: YearRange,
        mode: Option<ProbeMode>,
    ) -> ProbeReport {
        let probe = self.probe(mode.unwrap_or(ProbeMode::Bulk));
        let decisions = probe
            .filter_available(&catalog.ids(), years, self.config.concurrency)
            .await;
        let included: Vec<StationId> = decisions
            .iter()
            .filter(|d| d.is_included())
            .map(|d| d.station.clone())
            .collect();
        ProbeReport {
            available: catalog.filter_by_id(&included),
            decisions,
        }
    }

    /// Downloads the archives of `stations` for every year of `years` into the
    /// cache directory, one batch per year.
    ///
    /// Failures are reported per file; one failing file never aborts the others.
    /// Re-running skips files whose cached copy is current.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use isd_lite::{IsdLite, IsdLiteError, StationId, YearRange};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), IsdLiteError> {
    /// let client = IsdLite::new().await?;
    /// let zurich = StationId::new("066600", "99999")?;
    /// let reports = client
    ///     .download()
    ///     .stations(&[zurich])
    ///     .years(YearRange::new(2020, 2022).unwrap())
    ///     .call()
    ///     .await;
    /// for (year, report) in &reports {
    ///     println!("{year}: {} failed", report.failures().count());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn download(
        &self,
        stations: &[StationId],
        years: YearRange,
        force: Option<bool>,
        cancel: Option<CancellationToken>,
    ) -> Vec<(i32, BatchReport)> {
        let mut scheduler = self.scheduler();
        if let Some(token) = cancel {
            scheduler = scheduler.with_cancellation(token);
        }
        scheduler
            .fetch_years(
                &self.locator,
                &self.cache_dir,
                stations,
                years,
                force.unwrap_or(false),
            )
            .await
    }

    /// Decodes the cached archives of `stations` and consolidates them into one
    /// dataset, with stations in the given order.
    ///
    /// Nothing is downloaded here.
    ///
    /// # Errors
    ///
    /// Returns [`IsdLiteError::Decode`] (e.g. a missing archive) or
    /// [`IsdLiteError::Consolidation`].
    #[builder]
    pub async fn load_observations(
        &self,
        stations: &[Station],
        years: YearRange,
        region: Option<String>,
    ) -> Result<ConsolidatedDataset, IsdLiteError> {
        let decoder = ObservationDecoder::new(&self.cache_dir, self.config.missing_value);
        let decoder = &decoder;
        let series: Vec<_> = stream::iter(stations)
            .map(|station| async move {
                log!(
                    decision_level(self.config.verbose),
                    "Loading observations for station {} {}",
                    station.id,
                    station.name
                );
                decoder.decode_range(&station.id, years).await
            })
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        let engine = ConsolidationEngine::new(GlobalAttributes::new(self.config.base_url.as_str()));
        let dataset = engine.consolidate(&series, stations)?;
        Ok(match region {
            Some(region) => dataset.with_region(region),
            None => dataset,
        })
    }

    /// Runs the whole workflow for the stations of `catalog`: availability probe,
    /// download, decoding and consolidation.
    ///
    /// With `offline`, no request is made: availability is judged from the cache
    /// directory and nothing is downloaded. Otherwise `mode` selects the probe
    /// (default [`ProbeMode::Bulk`]) and `force` re-downloads every archive.
    /// Available stations with a failed download are dropped from the dataset and
    /// listed in [`DatasetBuild::dropped`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use isd_lite::{IsdLite, IsdLiteError, YearRange};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), IsdLiteError> {
    /// let client = IsdLite::new().await?;
    /// let catalog = client.station_catalog().call().await?.filter_by_country(&["SZ"]);
    /// let build = client
    ///     .build_dataset()
    ///     .catalog(&catalog)
    ///     .years(YearRange::new(2020, 2021).unwrap())
    ///     .region("SZ".to_string())
    ///     .call()
    ///     .await?;
    /// println!("{:?} (times, stations)", build.dataset.shape());
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn build_dataset(
        &self,
        catalog: &StationCatalog,
        years: YearRange,
        mode: Option<ProbeMode>,
        offline: Option<bool>,
        force: Option<bool>,
        region: Option<String>,
    ) -> Result<DatasetBuild, IsdLiteError> {
        let offline = offline.unwrap_or(false);
        let mode = if offline {
            ProbeMode::Offline(self.cache_dir.clone())
        } else {
            mode.unwrap_or(ProbeMode::Bulk)
        };

        let ProbeReport {
            available,
            decisions,
        } = self
            .filter_available()
            .catalog(catalog)
            .years(years)
            .mode(mode)
            .call()
            .await;
        info!(
            "{} of {} stations available for {}",
            available.len(),
            catalog.len(),
            years
        );

        let (downloads, dropped) = if offline {
            (Vec::new(), Vec::new())
        } else {
            let downloads = self
                .download()
                .stations(&available.ids())
                .years(years)
                .maybe_force(force)
                .call()
                .await;
            let owners: HashMap<PathBuf, &StationId> = available
                .iter()
                .flat_map(|s| {
                    years.years().map(move |year| {
                        (ResourceLocator::local_path(&self.cache_dir, year, &s.id), &s.id)
                    })
                })
                .collect();
            let failed: HashSet<&StationId> = downloads
                .iter()
                .flat_map(|(_, report)| report.failures())
                .filter_map(|r| owners.get(&r.item.path).copied())
                .collect();
            let dropped: Vec<StationId> = available
                .iter()
                .filter(|s| failed.contains(&s.id))
                .map(|s| s.id.clone())
                .collect();
            for id in &dropped {
                warn!("Dropping station {}: not all archives could be downloaded", id);
            }
            (downloads, dropped)
        };

        let stations: Vec<Station> = available
            .into_iter()
            .filter(|s| !dropped.contains(&s.id))
            .collect();
        let dataset = self
            .load_observations()
            .stations(&stations)
            .years(years)
            .maybe_region(region)
            .call()
            .await?;

        Ok(DatasetBuild {
            dataset,
            decisions,
            downloads,
            dropped,
        })
    }

    /// Writes `dataset` with the [`ParquetDatasetWriter`] into `dir` on a blocking
    /// thread and returns the files written.
    pub async fn write_dataset(
        &self,
        dataset: &ConsolidatedDataset,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, IsdLiteError> {
        let dataset = dataset.clone();
        let dir = dir.to_path_buf();
        let written =
            tokio::task::spawn_blocking(move || ParquetDatasetWriter::new().write(&dataset, &dir))
                .await??;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockRemote;
    use crate::types::observation::Variable;
    use crate::types::station::Location;
    use async_compression::tokio::write::GzipEncoder;
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    const BASE: &str = "https://example.org/isd-lite";
    const STATIONS_URL: &str = "https://example.org/isd-history.txt";

    async fn gzip(data: &str) -> Vec<u8> {
        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(data.as_bytes()).await.unwrap();
        encoder.shutdown().await.unwrap();
        encoder.into_inner()
    }

    fn station(id: &StationId, name: &str, latitude: f64, longitude: f64) -> Station {
        Station {
            id: id.clone(),
            name: name.to_string(),
            country: "SZ".to_string(),
            state: String::new(),
            call: String::new(),
            location: Location {
                latitude,
                longitude,
                elevation: 500.0,
            },
            begin: NaiveDate::from_ymd_opt(1931, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 1),
        }
    }

    /// Fluntern has 2020 and 2021, Kloten only 2020.
    async fn setup() -> (Arc<MockRemote>, IsdLite<MockRemote>, TempDir) {
        let remote = Arc::new(MockRemote::new());
        let locator = ResourceLocator::new(BASE);
        let fluntern = StationId::new("066600", "99999").unwrap();
        let kloten = StationId::new("066700", "99999").unwrap();

        let history = StationCatalog::new(vec![
            station(&fluntern, "ZURICH/FLUNTERN", 47.378, 8.566),
            station(&kloten, "ZURICH/KLOTEN", 47.480, 8.536),
        ])
        .to_history_string("Test stations");
        remote.put(STATIONS_URL, "h1", history.as_bytes());
        let files = [
            (2020, &fluntern, "2020 12 31 22   15   10 10200  270   30    4    0    0\n2020 12 31 23   12 -9999 10201  260   25    6   -1 -9999\n"),
            (2021, &fluntern, "2021 01 01 00   10    5 10203  250   20    8    3   12\n"),
            (2020, &kloten, "2020 12 31 23   20   11 10190  180   40    2    0    0\n"),
        ];
        for (year, id, body) in files {
            remote.put(&locator.data_url(year, id), &format!("{year}-{id}"), &gzip(body).await);
        }
        for year in [2020, 2021] {
            let links: String = files
                .iter()
                .filter(|(y, _, _)| *y == year)
                .map(|(y, id, _)| {
                    let name = ResourceLocator::file_name(*y, id);
                    format!("<a href=\"{name}\">{name}</a>\n")
                })
                .collect();
            remote.put_listing(&locator.year_directory(year), &format!("<html>{links}</html>"));
        }

        let dir = TempDir::new().unwrap();
        let config = IsdLiteConfig::builder()
            .base_url(BASE)
            .stations_url(STATIONS_URL)
            .cache_dir(dir.path())
            .concurrency(2)
            .verbose(true)
            .build();
        let client = IsdLite::with_remote(config, Arc::clone(&remote)).await.unwrap();
        (remote, client, dir)
    }

    #[tokio::test]
    async fn test_config_defaults() {
        let config = IsdLiteConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.missing_value, -9999);
        assert!(!config.verbose);
        assert!(config.cache_dir.is_none());
    }

    #[tokio::test]
    async fn test_station_catalog_is_cached() {
        let (remote, client, _dir) = setup().await;

        let first = client.station_catalog().call().await.unwrap();
        let second = client.station_catalog().call().await.unwrap();
        let offline = client.station_catalog().offline(true).call().await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first, offline);
        assert_eq!(remote.body_calls(STATIONS_URL), 1);
    }

    #[tokio::test]
    async fn test_build_dataset_end_to_end() {
        let (remote, client, dir) = setup().await;
        let catalog = client.station_catalog().call().await.unwrap();
        let years = YearRange::new(2020, 2021).unwrap();

        let build = client
            .build_dataset()
            .catalog(&catalog)
            .years(years)
            .region("SZ".to_string())
            .call()
            .await
            .unwrap();

        assert_eq!(build.decisions.len(), 2);
        assert!(build.decisions[0].is_included());
        assert!(!build.decisions[1].is_included());
        assert!(build.dropped.is_empty());
        assert_eq!(build.downloads.len(), 2);

        let ds = &build.dataset;
        assert_eq!(ds.shape(), (3, 1));
        assert_eq!(ds.global_attributes().url, BASE);
        assert_eq!(ds.global_attributes().region.as_deref(), Some("SZ"));
        let t = ds.variable(Variable::Temperature);
        assert_eq!(t.get(0, 0), Some(1.5));
        let prec = ds.variable(Variable::Precipitation1h);
        assert_eq!(prec.get(1, 0), Some(0.0));
        assert!(ds
            .variable(Variable::Precipitation6h)
            .get(1, 0)
            .unwrap()
            .is_nan());

        let body_calls = remote.total_body_calls();
        let offline = client
            .build_dataset()
            .catalog(&catalog)
            .years(years)
            .offline(true)
            .call()
            .await
            .unwrap();
        assert_eq!(offline.dataset.shape(), (3, 1));
        assert_eq!(remote.total_body_calls(), body_calls);

        let written = client
            .write_dataset(&offline.dataset, &dir.path().join("out"))
            .await
            .unwrap();
        assert_eq!(written.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_download_drops_station() {
        let (remote, client, _dir) = setup().await;
        let catalog = client.station_catalog().call().await.unwrap();
        let fluntern = StationId::new("066600", "99999").unwrap();
        remote.update(&client.locator().data_url(2021, &fluntern), |r| {
            r.fail_status = true;
        });

        let build = client
            .build_dataset()
            .catalog(&catalog)
            .years(YearRange::new(2020, 2021).unwrap())
            .mode(ProbeMode::Point)
            .call()
            .await
            .unwrap();

        assert_eq!(build.dropped, vec![fluntern]);
        assert_eq!(build.dataset.shape(), (0, 0));
    }

    #[tokio::test]
    async fn test_load_without_download_reports_missing_archive() {
        let (_remote, client, _dir) = setup().await;
        let catalog = client.station_catalog().call().await.unwrap();

        let err = client
            .load_observations()
            .stations(catalog.stations())
            .years(YearRange::single(2020))
            .call()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IsdLiteError::Decode(crate::observations::error::DecodeError::MissingArchive { .. })
        ));
    }
}

//! Bounded-concurrency fan-out of conditional fetches.

use crate::acquisition::error::FetchError;
use crate::acquisition::fetch_cache::{ConditionalFetchCache, FetchOutcome};
use crate::remote::client::RemoteSource;
use crate::remote::locator::ResourceLocator;
use crate::types::station_id::StationId;
use crate::types::year_range::YearRange;
use futures_util::{stream, StreamExt};
use log::{info, warn};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Number of concurrent fetches when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// A single unit of work: download `url` into `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItem {
    pub url: String,
    pub path: PathBuf,
}

/// The outcome of one item of a batch.
#[derive(Debug)]
pub struct ItemResult {
    /// Position of the item in the submitted batch.
    pub index: usize,
    pub item: FetchItem,
    pub result: Result<FetchOutcome, FetchError>,
}

/// Per-item results of a batch, in completion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<ItemResult>,
}

impl BatchReport {
    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Items that were downloaded or skipped.
    pub fn successes(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(|r| r.result.is_ok())
    }

    /// Items that ended with an error, including cancelled ones.
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(|r| r.result.is_err())
    }

    /// Number of items whose body was transferred.
    pub fn downloaded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.result, Ok(o) if o.is_downloaded()))
            .count()
    }

    /// Number of items left alone because the cached copy was current.
    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.result, Ok(FetchOutcome::Skipped)))
            .count()
    }

    /// Reorders the results to match the submission order.
    pub fn into_input_order(mut self) -> Vec<ItemResult> {
        self.results.sort_by_key(|r| r.index);
        self.results
    }
}

/// Runs batches of fetches through a [`ConditionalFetchCache`] with at most
/// `concurrency` in flight at a time.
///
/// Every item runs to its own conclusion: a failing item is recorded in the
/// [`BatchReport`] and never cancels or delays its siblings. No retries are made;
/// re-running a batch skips items that are already cached and current.
#[derive(Debug)]
pub struct DownloadScheduler<R> {
    cache: ConditionalFetchCache<R>,
    concurrency: usize,
    cancel: Option<CancellationToken>,
}

impl<R: RemoteSource> DownloadScheduler<R> {
    /// Creates a scheduler; `None` selects [`DEFAULT_CONCURRENCY`].
    pub fn new(cache: ConditionalFetchCache<R>, concurrency: Option<usize>) -> Self {
        Self {
            cache,
            concurrency: concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1),
            cancel: None,
        }
    }

    /// Attaches a token; once cancelled, pending and in-flight items finish as
    /// [`FetchError::Cancelled`]. Finished items keep their result.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Maximum number of fetches in flight.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches `urls[i]` into `paths[i]` for every `i`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InconsistentInput`] before any work starts if the two
    /// lists differ in length. Per-item failures are reported in the batch instead.
    pub async fn fetch_many(
        &self,
        urls: Vec<String>,
        paths: Vec<PathBuf>,
        force: bool,
    ) -> Result<BatchReport, FetchError> {
        if urls.len() != paths.len() {
            return Err(FetchError::InconsistentInput {
                urls: urls.len(),
                paths: paths.len(),
            });
        }
        let items = urls
            .into_iter()
            .zip(paths)
            .map(|(url, path)| FetchItem { url, path })
            .collect();
        Ok(self.fetch_items(items, force).await)
    }

    /// Fetches a batch of items, reporting results as they complete.
    pub async fn fetch_items(&self, items: Vec<FetchItem>, force: bool) -> BatchReport {
        let results = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move {
                let result = self.fetch_one(&item, force).await;
                if let Err(e) = &result {
                    warn!("Download of {} failed: {}", item.url, e);
                }
                ItemResult {
                    index,
                    item,
                    result,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        BatchReport { results }
    }

    async fn fetch_one(&self, item: &FetchItem, force: bool) -> Result<FetchOutcome, FetchError> {
        let cancelled = || FetchError::Cancelled {
            url: item.url.clone(),
        };
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(cancelled()),
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(cancelled()),
                result = self.cache.fetch(&item.url, &item.path, force) => result,
            },
            None => self.cache.fetch(&item.url, &item.path, force).await,
        }
    }

    /// Downloads the archives of `stations` for every year of `years` into `dir`.
    ///
    /// Batches run one year at a time; parallelism is across stations within a
    /// year. Returns one report per year, in year order.
    pub async fn fetch_years(
        &self,
        locator: &ResourceLocator,
        dir: &Path,
        stations: &[StationId],
        years: YearRange,
        force: bool,
    ) -> Vec<(i32, BatchReport)> {
        let mut reports = Vec::with_capacity(years.len());
        for year in years.years() {
            let items = stations
                .iter()
                .map(|station| FetchItem {
                    url: locator.data_url(year, station),
                    path: ResourceLocator::local_path(dir, year, station),
                })
                .collect();
            let report = self.fetch_items(items, force).await;
            info!(
                "Year {}: {} downloaded, {} skipped, {} failed",
                year,
                report.downloaded(),
                report.skipped(),
                report.failures().count()
            );
            reports.push((year, report));
        }
        reports
    }
}

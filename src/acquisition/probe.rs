//! Remote (or local) availability checks used to prune a station list before a
//! bulk download.
//!
//! [`ProbeMode::Point`] issues one existence check per archive and is the
//! reference answer. [`ProbeMode::Bulk`] reads each year's directory listing once
//! and tests membership, which is much cheaper for large station lists.
//! [`ProbeMode::Offline`] only looks at the local cache. None of the modes touches
//! cache entries.

use crate::remote::client::RemoteSource;
use crate::remote::listing::{normalize_url, parse_listing};
use crate::remote::locator::ResourceLocator;
use crate::types::station_id::StationId;
use crate::types::year_range::YearRange;
use crate::utils::decision_level;
use futures_util::{stream, StreamExt};
use log::{debug, log, warn};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// How availability is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeMode {
    /// One existence check per station-year.
    Point,
    /// One directory listing per year, shared by all stations of the call.
    Bulk,
    /// Archives must already be present in the given cache directory.
    Offline(PathBuf),
}

/// Result of probing one station over a year range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Every year of the range is available.
    Available,
    /// The archive of `year` is not available.
    Missing { year: i32 },
    /// The check for `year` failed; the station is treated as unavailable.
    CheckFailed { year: i32, reason: String },
}

impl Availability {
    /// Whether the station has every requested year.
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "all years available"),
            Availability::Missing { year } => write!(f, "no archive for {year}"),
            Availability::CheckFailed { year, reason } => {
                write!(f, "check for {year} failed: {reason}")
            }
        }
    }
}

/// Inclusion decision for one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeDecision {
    pub station: StationId,
    pub availability: Availability,
}

impl ProbeDecision {
    /// Whether the station passes the filter.
    pub fn is_included(&self) -> bool {
        self.availability.is_available()
    }
}

/// Listed archive URLs per year, fetched once per probe call.
#[derive(Debug, Default, Clone)]
pub struct ListingIndex {
    by_year: HashMap<i32, BTreeSet<String>>,
}

impl ListingIndex {
    /// Whether `url` appears in the listing of `year`.
    pub fn contains(&self, year: i32, url: &str) -> bool {
        let Some(files) = self.by_year.get(&year) else {
            return false;
        };
        normalize_url(url).is_some_and(|u| files.contains(&u))
    }

    /// Number of files listed for `year`.
    pub fn file_count(&self, year: i32) -> usize {
        self.by_year.get(&year).map_or(0, BTreeSet::len)
    }
}

/// Checks whether all archives of a station over a year range exist.
#[derive(Debug)]
pub struct AvailabilityProbe<R> {
    remote: Arc<R>,
    locator: ResourceLocator,
    mode: ProbeMode,
    verbose: bool,
}

impl<R: RemoteSource> AvailabilityProbe<R> {
    /// Creates a probe.
    ///
    /// # Arguments
    ///
    /// * `remote` - Answers existence checks and listings; unused in [`ProbeMode::Offline`].
    /// * `locator` - Maps stations and years to archive URLs and year directories.
    /// * `mode` - How availability is determined, see [`ProbeMode`].
    /// * `verbose` - Log each inclusion/exclusion at `info` instead of `debug`.
    pub fn new(remote: Arc<R>, locator: ResourceLocator, mode: ProbeMode, verbose: bool) -> Self {
        Self {
            remote,
            locator,
            mode,
            verbose,
        }
    }

    pub fn mode(&self) -> &ProbeMode {
        &self.mode
    }

    /// Fetches and parses the directory listing of every year in `years`.
    ///
    /// A listing that cannot be fetched, answers with an error status or is not
    /// HTML contributes zero files for its year.
    pub async fn load_listings(&self, years: YearRange) -> ListingIndex {
        let mut index = ListingIndex::default();
        for year in years.years() {
            let url = self.locator.year_directory(year);
            let files = match self.remote.listing(&url).await {
                Ok(Some(html)) => parse_listing(&url, &html),
                Ok(None) => {
                    warn!("Listing {} unavailable, assuming no files for {}", url, year);
                    BTreeSet::new()
                }
                Err(e) => {
                    warn!("Listing {} failed ({}), assuming no files for {}", url, e, year);
                    BTreeSet::new()
                }
            };
            debug!("Listing {}: {} files", url, files.len());
            index.by_year.insert(year, files);
        }
        index
    }

    /// Whether every archive of `station` for `years` is available.
    pub async fn is_available(&self, station: &StationId, years: YearRange) -> bool {
        let listings = match self.mode {
            ProbeMode::Bulk => self.load_listings(years).await,
            _ => ListingIndex::default(),
        };
        self.check(station, years, &listings).await.is_available()
    }

    /// Probes every station with at most `concurrency` checks in flight.
    ///
    /// Decisions are returned in the order of `stations`. In bulk mode the year
    /// listings are fetched once for the whole call.
    pub async fn filter_available(
        &self,
        stations: &[StationId],
        years: YearRange,
        concurrency: usize,
    ) -> Vec<ProbeDecision> {
        let listings = match self.mode {
            ProbeMode::Bulk => self.load_listings(years).await,
            _ => ListingIndex::default(),
        };
        let listings = &listings;

        let decisions: Vec<ProbeDecision> = stream::iter(stations)
            .map(|station| async move {
                let availability = self.check(station, years, listings).await;
                let decision = ProbeDecision {
                    station: station.clone(),
                    availability,
                };
                self.log_decision(&decision, years);
                decision
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let included = decisions.iter().filter(|d| d.is_included()).count();
        log!(
            decision_level(self.verbose),
            "{} of {} stations have data for {}",
            included,
            decisions.len(),
            years
        );
        decisions
    }

    async fn check(
        &self,
        station: &StationId,
        years: YearRange,
        listings: &ListingIndex,
    ) -> Availability {
        for year in years.years() {
            let present = match &self.mode {
                ProbeMode::Point => {
                    let url = self.locator.data_url(year, station);
                    match self.remote.exists(&url).await {
                        Ok(present) => present,
                        Err(e) => {
                            warn!("Existence check for {} failed: {}", url, e);
                            return Availability::CheckFailed {
                                year,
                                reason: e.to_string(),
                            };
                        }
                    }
                }
                ProbeMode::Bulk => listings.contains(year, &self.locator.data_url(year, station)),
                ProbeMode::Offline(dir) => {
                    let path = ResourceLocator::local_path(dir, year, station);
                    match tokio::fs::try_exists(&path).await {
                        Ok(present) => present,
                        Err(e) => {
                            return Availability::CheckFailed {
                                year,
                                reason: format!("{}: {}", path.display(), e),
                            }
                        }
                    }
                }
            };
            if !present {
                return Availability::Missing { year };
            }
        }
        Availability::Available
    }

    fn log_decision(&self, decision: &ProbeDecision, years: YearRange) {
        let verdict = if decision.is_included() {
            "included"
        } else {
            "excluded"
        };
        log!(
            decision_level(self.verbose),
            "Station {} {} for {}: {}",
            decision.station,
            verdict,
            years,
            decision.availability
        );
    }
}

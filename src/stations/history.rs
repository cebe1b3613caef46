//! The ISD station history table (`isd-history.txt`) and filters over it.

use crate::stations::error::StationError;
use crate::stations::region::{BoundingBox, Radius, Region};
use crate::types::station::{Location, Station};
use crate::types::station_id::StationId;
use chrono::NaiveDate;
use log::debug;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use std::path::Path;

/// Column widths of the fixed-width table, in characters.
const COLUMN_WIDTHS: [usize; 11] = [6, 6, 30, 3, 5, 5, 9, 9, 8, 9, 9];

/// Lines preceding the first data row.
const HEADER_LINES: usize = 22;

const DATE_FORMAT: &str = "%Y%m%d";

const COLUMN_TITLES: &str =
    "USAF   WBAN  STATION NAME                  CTRY ST CALL  LAT     LON      ELEV    BEGIN    END";

const LEGEND: &str = " USAF = Air Force station ID. May contain a letter in the first position.
 WBAN = NCDC WBAN number
 CTRY = FIPS country ID
   ST = State for US stations
 ICAO = ICAO ID
  LAT = Latitude in thousandths of decimal degrees
  LON = Longitude in thousandths of decimal degrees
 ELEV = Elevation in meters
BEGIN = Beginning Period Of Record (YYYYMMDD). There may be reporting gaps within the P.O.R.
  END = Ending Period Of Record (YYYYMMDD). There may be reporting gaps within the P.O.R.

Notes:
- Missing station name, etc indicate the metadata are not currently available.
- The term \"bogus\" indicates that the station name, etc are not available.
- For a small % of the station entries in this list, climatic data are not
  available. To determine data availability for each location, see the
  'isd-inventory.txt' or 'isd-inventory.csv' file.
";

/// An ordered, immutable collection of station metadata.
///
/// Every filter returns a new catalog and keeps the relative order of the
/// stations it retains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationCatalog {
    stations: Vec<Station>,
}

impl StationCatalog {
    /// Creates a catalog holding `stations` in the given order.
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    /// Parses the text of a station history table.
    ///
    /// The first 22 lines are skipped. Rows with neither latitude nor longitude and
    /// rows whose name contains "bogus" (any case) are dropped. Unparsable numbers
    /// become `NaN`, unparsable dates `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::MalformedRow`] if a row lacks a valid USAF/WBAN pair.
    pub fn parse(text: &str) -> Result<Self, StationError> {
        let mut stations = Vec::new();
        for (index, line) in text.lines().enumerate().skip(HEADER_LINES) {
            if line.trim().is_empty() {
                continue;
            }
            let cols = split_columns(line);
            let id = StationId::new(cols[0].as_str(), cols[1].as_str()).map_err(|e| {
                StationError::MalformedRow {
                    line: index + 1,
                    reason: e.to_string(),
                }
            })?;

            let latitude = parse_number(&cols[6]);
            let longitude = parse_number(&cols[7]);
            if latitude.is_nan() && longitude.is_nan() {
                continue;
            }
            let name = cols[2].clone();
            if name.to_lowercase().contains("bogus") {
                continue;
            }

            stations.push(Station {
                id,
                name,
                country: cols[3].clone(),
                state: cols[4].clone(),
                call: cols[5].clone(),
                location: Location {
                    latitude,
                    longitude,
                    elevation: parse_number(&cols[8]),
                },
                begin: NaiveDate::parse_from_str(&cols[9], DATE_FORMAT).ok(),
                end: NaiveDate::parse_from_str(&cols[10], DATE_FORMAT).ok(),
            });
        }
        debug!("Parsed {} stations from station history", stations.len());
        Ok(Self { stations })
    }

    /// Reads a station history file.
    pub async fn from_file(path: &Path) -> Result<Self, StationError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| StationError::CacheRead(path.to_path_buf(), e))?;
        Self::parse(&String::from_utf8_lossy(&raw))
    }

    /// Renders the catalog in the station history layout, so that
    /// [`StationCatalog::parse`] reads it back.
    ///
    /// `title_line` becomes the first line of the file and can describe the
    /// selection, e.g. "Stations in Texas with data for 2002-2012".
    pub fn to_history_string(&self, title_line: &str) -> String {
        let mut out = String::new();
        out.push_str(title_line.lines().next().unwrap_or_default());
        out.push_str("\n\n");
        out.push_str(LEGEND);
        out.push('\n');
        out.push_str(COLUMN_TITLES);
        out.push_str("\n\n");

        for s in &self.stations {
            let _ = writeln!(
                out,
                "{:<6}{:>6} {:<29.29}{:>3}{:>5}{:>5}{}{}{}{:>9}{:>9}",
                s.id.usaf(),
                s.id.wban(),
                s.name,
                s.country,
                s.state,
                s.call,
                format_number(s.location.latitude, 9, 3),
                format_number(s.location.longitude, 9, 3),
                format_number(s.location.elevation, 8, 1),
                format_date(s.begin),
                format_date(s.end),
            );
        }
        out
    }

    /// Writes the catalog to `path` in the station history layout.
    pub async fn save(&self, title_line: &str, path: &Path) -> Result<(), StationError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StationError::CacheWrite(parent.to_path_buf(), e))?;
        }
        tokio::fs::write(path, self.to_history_string(title_line))
            .await
            .map_err(|e| StationError::CacheWrite(path.to_path_buf(), e))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn into_stations(self) -> Vec<Station> {
        self.stations
    }

    /// Number of stations.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    /// Station ids in catalog order.
    pub fn ids(&self) -> Vec<StationId> {
        self.stations.iter().map(|s| s.id.clone()).collect()
    }

    /// Looks a station up by id.
    pub fn get(&self, id: &StationId) -> Option<&Station> {
        self.stations.iter().find(|s| &s.id == id)
    }

    /// Sorted, unique, non-empty FIPS country codes.
    pub fn countries(&self) -> Vec<String> {
        sorted_unique(self.stations.iter().map(|s| s.country.as_str()))
    }

    /// Sorted, unique, non-empty US state codes.
    pub fn us_states(&self) -> Vec<String> {
        sorted_unique(self.stations.iter().map(|s| s.state.as_str()))
    }

    /// Keeps the stations for which `predicate` holds.
    pub fn filter(&self, predicate: impl Fn(&Station) -> bool) -> Self {
        Self {
            stations: self
                .stations
                .iter()
                .filter(|s| predicate(s))
                .cloned()
                .collect(),
        }
    }

    /// Keeps stations whose FIPS country code is one of `countries`.
    ///
    /// # Arguments
    ///
    /// * `countries` - Country codes such as `"US"` or `"SZ"`, compared exactly.
    ///
    /// # Returns
    ///
    /// A new catalog; relative order is preserved.
    pub fn filter_by_country<S: AsRef<str>>(&self, countries: &[S]) -> Self {
        self.filter(|s| countries.iter().any(|c| c.as_ref() == s.country))
    }

    /// Keeps stations whose state code is one of `states`, e.g. `["CO", "TX"]`.
    pub fn filter_by_us_state<S: AsRef<str>>(&self, states: &[S]) -> Self {
        self.filter(|s| states.iter().any(|c| c.as_ref() == s.state))
    }

    /// Keeps stations inside the latitude/longitude box (inclusive).
    pub fn filter_by_coordinates(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    ) -> Self {
        self.filter_by_region(&BoundingBox {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Keeps stations whose nominal period of record covers `[start, end]`.
    pub fn filter_by_period(&self, start: NaiveDate, end: NaiveDate) -> Self {
        self.filter(|s| s.covers_period(start, end))
    }

    /// Keeps the listed stations, in catalog order.
    pub fn filter_by_id(&self, ids: &[StationId]) -> Self {
        let wanted: HashSet<&StationId> = ids.iter().collect();
        self.filter(|s| wanted.contains(&s.id))
    }

    /// Keeps stations whose coordinates lie inside `region`.
    ///
    /// Missing coordinates are `NaN` and fall outside every built-in region.
    pub fn filter_by_region<G: Region + ?Sized>(&self, region: &G) -> Self {
        self.filter(|s| region.contains(s.location.latitude, s.location.longitude))
    }

    /// Keeps stations within `radius_km` of a point.
    pub fn filter_by_radius(&self, latitude: f64, longitude: f64, radius_km: f64) -> Self {
        self.filter_by_region(&Radius {
            latitude,
            longitude,
            radius_km,
        })
    }
}

impl IntoIterator for StationCatalog {
    type Item = Station;
    type IntoIter = std::vec::IntoIter<Station>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.into_iter()
    }
}

impl FromIterator<Station> for StationCatalog {
    fn from_iter<T: IntoIterator<Item = Station>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Splits a row into its trimmed fixed-width columns. Short rows yield empty columns.
fn split_columns(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut start = 0;
    COLUMN_WIDTHS
        .iter()
        .map(|width| {
            let end = (start + width).min(chars.len());
            let begin = start.min(chars.len());
            start += width;
            chars[begin..end].iter().collect::<String>().trim().to_string()
        })
        .collect()
}

fn parse_number(field: &str) -> f64 {
    field.parse().unwrap_or(f64::NAN)
}

fn format_number(value: f64, width: usize, precision: usize) -> String {
    if value.is_nan() {
        " ".repeat(width)
    } else {
        format!("{value:>+width$.precision$}")
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

//! Defines the data structures representing ISD weather stations and their metadata,
//! as listed in the Integrated Surface Database station history file.

use crate::types::station_id::StationId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Represents a single ISD weather station and its associated metadata.
///
/// This structure mirrors one row of the station history table (`isd-history.txt`):
/// identification, geographical location and the nominal period of record.
/// Text fields that are blank in the table are empty strings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    /// The USAF/WBAN identifier pair.
    pub id: StationId,
    /// The station name (e.g., "LAS VEGAS/MCCARRAN").
    pub name: String,
    /// FIPS country code (e.g., "US", "SZ").
    pub country: String,
    /// State code for US stations, empty elsewhere.
    pub state: String,
    /// ICAO call sign, if the station is at an airport.
    pub call: String,
    /// Geographical location (latitude, longitude, elevation).
    pub location: Location,
    /// Beginning of the period of record, if known.
    pub begin: Option<NaiveDate>,
    /// End of the period of record, if known. Reporting gaps may exist within the period.
    pub end: Option<NaiveDate>,
}

/// Represents the geographical location of a weather station.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees (positive for North, negative for South).
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East, negative for West).
    pub longitude: f64,
    /// Elevation above sea level in meters, `NaN` if unknown.
    pub elevation: f64,
}

impl Station {
    /// Whether the nominal period of record covers `[start, end]` entirely.
    ///
    /// Stations without a recorded begin or end date never qualify.
    pub fn covers_period(&self, start: NaiveDate, end: NaiveDate) -> bool {
        matches!((self.begin, self.end), (Some(b), Some(e)) if b <= start && e >= end)
    }
}

//! Defines the hourly ISD-Lite observation record and the catalogue of observed variables.

use crate::types::station_id::StationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of observation fields carried by every ISD-Lite record.
pub const VARIABLE_COUNT: usize = 8;

/// One of the eight observed quantities in an ISD-Lite record, in file column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variable {
    /// Air temperature at 2 m above ground.
    Temperature,
    /// Dew point temperature at 2 m above ground.
    DewPoint,
    /// Sea level pressure.
    SeaLevelPressure,
    /// Wind direction.
    WindDirection,
    /// Wind speed at 10 m above ground.
    WindSpeed,
    /// Sky condition total coverage code.
    SkyCondition,
    /// 1 h accumulated precipitation.
    Precipitation1h,
    /// 6 h accumulated precipitation.
    Precipitation6h,
}

impl Variable {
    /// All variables in file column order.
    pub const ALL: [Variable; VARIABLE_COUNT] = [
        Variable::Temperature,
        Variable::DewPoint,
        Variable::SeaLevelPressure,
        Variable::WindDirection,
        Variable::WindSpeed,
        Variable::SkyCondition,
        Variable::Precipitation1h,
        Variable::Precipitation6h,
    ];

    /// Position of the variable in [`Variable::ALL`] and in record value arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name used for dataset columns.
    pub fn name(self) -> &'static str {
        match self {
            Variable::Temperature => "T",
            Variable::DewPoint => "TD",
            Variable::SeaLevelPressure => "SLP",
            Variable::WindDirection => "WD",
            Variable::WindSpeed => "WS",
            Variable::SkyCondition => "SKY",
            Variable::Precipitation1h => "PREC1H",
            Variable::Precipitation6h => "PREC6H",
        }
    }

    /// Human readable name, e.g. "Air temperature".
    pub fn long_name(self) -> &'static str {
        match self {
            Variable::Temperature => "Air temperature at 2 m above ground",
            Variable::DewPoint => "Dew point temperature at 2 m above ground",
            Variable::SeaLevelPressure => "Sea level pressure",
            Variable::WindDirection => "Wind direction",
            Variable::WindSpeed => "Wind speed at 10 m above ground",
            Variable::SkyCondition => "Sky condition",
            Variable::Precipitation1h => "1 h accumulated precipitation",
            Variable::Precipitation6h => "6 h accumulated precipitation",
        }
    }

    /// Units of the decoded (scaled) value.
    pub fn units(self) -> &'static str {
        match self {
            Variable::Temperature | Variable::DewPoint => "C",
            Variable::SeaLevelPressure => "hPa",
            Variable::WindDirection => "angular degrees",
            Variable::WindSpeed => "m s-1",
            Variable::SkyCondition => "",
            Variable::Precipitation1h | Variable::Precipitation6h => "mm",
        }
    }

    /// Whether the raw archive value is stored in tenths of the unit.
    pub fn is_scaled(self) -> bool {
        !matches!(self, Variable::WindDirection | Variable::SkyCondition)
    }

    /// Whether a raw value of `-1` encodes a trace amount.
    pub fn is_precipitation(self) -> bool {
        matches!(self, Variable::Precipitation1h | Variable::Precipitation6h)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single hourly observation of one station.
///
/// Values are physical (already scaled) and `NaN` marks a missing reading.
/// The station the record belongs to is held once by the enclosing [`StationSeries`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationRecord {
    pub time: DateTime<Utc>,
    pub values: [f64; VARIABLE_COUNT],
}

impl ObservationRecord {
    /// Decoded value of `variable`; `NaN` if missing.
    pub fn get(&self, variable: Variable) -> f64 {
        self.values[variable.index()]
    }

    /// Returns the value, or `None` if it is missing.
    pub fn value(&self, variable: Variable) -> Option<f64> {
        let v = self.get(variable);
        (!v.is_nan()).then_some(v)
    }
}

/// The time-ordered observations of one station, possibly spanning several years.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSeries {
    pub station: StationId,
    pub records: Vec<ObservationRecord>,
}

impl StationSeries {
    /// Wraps the records of `station`, which are expected in time order.
    pub fn new(station: StationId, records: Vec<ObservationRecord>) -> Self {
        Self { station, records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates the record timestamps in stored order.
    pub fn times(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.records.iter().map(|r| r.time)
    }
}

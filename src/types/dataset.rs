//! The consolidated time × station dataset and its supporting array types.

use crate::types::observation::{Variable, VARIABLE_COUNT};
use crate::types::station::Station;
use crate::types::station_id::StationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dense, row-major 2-D array of `f64` indexed by (time position, station position).
///
/// Missing cells hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Creates a grid of the given shape with every cell missing.
    pub fn missing(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![f64::NAN; rows * cols],
        }
    }

    /// `(rows, cols)`, i.e. `(times, stations)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Value at `(row, col)`; `None` when out of bounds, `Some(NaN)` for a gap.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// All values of one row (one timestamp across stations).
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// All values of one column (one station across time).
    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().skip(col).step_by(self.cols.max(1)).copied()
    }

    /// The raw row-major buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Station-indexed scalar attributes, one entry per dataset station in station order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationAttributes {
    pub station_id: Vec<String>,
    pub usaf: Vec<String>,
    pub wban: Vec<String>,
    pub name: Vec<String>,
    pub country: Vec<String>,
    pub state: Vec<String>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub elevation: Vec<f64>,
}

impl StationAttributes {
    pub(crate) fn push(&mut self, station: &Station) {
        self.station_id.push(station.id.to_string());
        self.usaf.push(station.id.usaf().to_string());
        self.wban.push(station.id.wban().to_string());
        self.name.push(station.name.clone());
        self.country.push(station.country.clone());
        self.state.push(station.state.clone());
        self.latitude.push(station.location.latitude);
        self.longitude.push(station.location.longitude);
        self.elevation.push(station.location.elevation);
    }

    /// Number of stations.
    pub fn len(&self) -> usize {
        self.station_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.station_id.is_empty()
    }
}

/// Global descriptive metadata of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalAttributes {
    pub title: String,
    pub source: String,
    #[serde(rename = "URL")]
    pub url: String,
    /// Region or station selector the dataset was built for, if any.
    pub region: Option<String>,
}

impl GlobalAttributes {
    /// Default title and source for the NCEI archive at `url`, no region.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            title: "ISD-Lite station observations".to_string(),
            source: "National Centers for Environmental Information (NCEI)".to_string(),
            url: url.into(),
            region: None,
        }
    }
}

/// The dense time × station matrix produced by merging per-station series.
///
/// Every variable is a [`Grid`] of shape `(times.len(), stations.len())`. Row `i`
/// corresponds to `times[i]` (sorted ascending, unique) and column `j` to
/// `stations[j]` (caller order). A cell holds either the station's own reading at
/// that timestamp or `NaN`; nothing is interpolated.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedDataset {
    pub(crate) times: Vec<DateTime<Utc>>,
    pub(crate) stations: Vec<StationId>,
    pub(crate) variables: [Grid; VARIABLE_COUNT],
    pub(crate) attributes: StationAttributes,
    pub(crate) global: GlobalAttributes,
}

impl ConsolidatedDataset {
    /// The shared time axis.
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    /// The station axis, in the order supplied to consolidation.
    pub fn stations(&self) -> &[StationId] {
        &self.stations
    }

    /// `(times, stations)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.times.len(), self.stations.len())
    }

    /// The grid of one variable, shape [`ConsolidatedDataset::shape`].
    pub fn variable(&self, variable: Variable) -> &Grid {
        &self.variables[variable.index()]
    }

    /// Station-indexed side arrays, in station order.
    pub fn attributes(&self) -> &StationAttributes {
        &self.attributes
    }

    pub fn global_attributes(&self) -> &GlobalAttributes {
        &self.global
    }

    /// Sets the region descriptor in the global attributes.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.global.region = Some(region.into());
        self
    }

    /// Looks up a single cell by label. Returns `None` if the timestamp or station
    /// is not part of the dataset, `Some(NaN)` if the cell is missing.
    pub fn value_at(
        &self,
        variable: Variable,
        time: DateTime<Utc>,
        station: &StationId,
    ) -> Option<f64> {
        let row = self.times.binary_search(&time).ok()?;
        let col = self.stations.iter().position(|s| s == station)?;
        self.variable(variable).get(row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_accessors() {
        let mut grid = Grid::missing(3, 2);
        grid.set(1, 0, 4.5);
        grid.set(2, 1, -1.0);
        assert_eq!(grid.shape(), (3, 2));
        assert_eq!(grid.get(1, 0), Some(4.5));
        assert!(grid.get(0, 0).unwrap().is_nan());
        assert_eq!(grid.get(3, 0), None);
        assert_eq!(grid.row(2)[1], -1.0);
        let col: Vec<f64> = grid.column(0).collect();
        assert_eq!(col.len(), 3);
        assert_eq!(col[1], 4.5);
    }
}

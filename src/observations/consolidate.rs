//! Alignment of independent per-station series onto one shared time axis.

use crate::observations::error::ConsolidationError;
use crate::types::dataset::{ConsolidatedDataset, GlobalAttributes, Grid, StationAttributes};
use crate::types::observation::{StationSeries, Variable};
use crate::types::station::Station;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashSet;

/// Merges station series into a [`ConsolidatedDataset`].
#[derive(Debug, Clone)]
pub struct ConsolidationEngine {
    global: GlobalAttributes,
}

impl ConsolidationEngine {
    /// Creates an engine that stamps every dataset with `global`.
    pub fn new(global: GlobalAttributes) -> Self {
        Self { global }
    }

    /// Builds the dense time × station dataset.
    ///
    /// `series[j]` and `stations[j]` must describe the same station; column `j` of
    /// every variable grid holds that station. The time axis is the sorted union of
    /// all record timestamps. A station without a record at a given time gets `NaN`
    /// there. If a series repeats a timestamp, its last record wins.
    ///
    /// # Errors
    ///
    /// * [`ConsolidationError::InconsistentInput`] if the two lists differ in length.
    /// * [`ConsolidationError::StationMismatch`] if `series[j]` and `stations[j]`
    ///   disagree on the station id.
    /// * [`ConsolidationError::DuplicateStation`] if a station is listed twice.
    pub fn consolidate(
        &self,
        series: &[StationSeries],
        stations: &[Station],
    ) -> Result<ConsolidatedDataset, ConsolidationError> {
        if series.len() != stations.len() {
            return Err(ConsolidationError::InconsistentInput {
                series: series.len(),
                stations: stations.len(),
            });
        }
        let mut seen = HashSet::with_capacity(series.len());
        for (index, (s, station)) in series.iter().zip(stations).enumerate() {
            if s.station != station.id {
                return Err(ConsolidationError::StationMismatch {
                    index,
                    series: s.station.clone(),
                    attributes: station.id.clone(),
                });
            }
            if !seen.insert(&station.id) {
                return Err(ConsolidationError::DuplicateStation(station.id.clone()));
            }
        }

        let times = union_time_axis(series);
        let (rows, cols) = (times.len(), series.len());
        let mut variables = Variable::ALL.map(|_| Grid::missing(rows, cols));

        for (col, s) in series.iter().enumerate() {
            for record in &s.records {
                // Every record time is on the axis by construction.
                let Ok(row) = times.binary_search(&record.time) else {
                    continue;
                };
                for (grid, value) in variables.iter_mut().zip(record.values) {
                    grid.set(row, col, value);
                }
            }
        }

        let mut attributes = StationAttributes::default();
        for station in stations {
            attributes.push(station);
        }
        debug!("Consolidated {} stations onto {} timestamps", cols, rows);

        Ok(ConsolidatedDataset {
            times,
            stations: stations.iter().map(|s| s.id.clone()).collect(),
            variables,
            attributes,
            global: self.global.clone(),
        })
    }
}

/// Sorted, deduplicated union of all record timestamps.
fn union_time_axis(series: &[StationSeries]) -> Vec<DateTime<Utc>> {
    let mut times: Vec<DateTime<Utc>> = series.iter().flat_map(|s| s.times()).collect();
    times.sort_unstable();
    times.dedup();
    times
}

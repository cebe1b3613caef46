//! Persistence of a [`ConsolidatedDataset`] as Parquet tables plus a JSON sidecar.

use crate::types::dataset::{ConsolidatedDataset, GlobalAttributes};
use crate::types::observation::Variable;
use crate::writers::error::WriteError;
use log::info;
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const OBSERVATIONS_FILE: &str = "observations.parquet";
pub const STATIONS_FILE: &str = "stations.parquet";
pub const ATTRIBUTES_FILE: &str = "attributes.json";

/// Serializes a dataset into a directory.
///
/// Implementations block; call them from `tokio::task::spawn_blocking` inside an
/// async context.
pub trait DatasetWriter {
    /// Writes `dataset` into `dir` (created if needed) and returns the files written.
    fn write(&self, dataset: &ConsolidatedDataset, dir: &Path) -> Result<Vec<PathBuf>, WriteError>;
}

/// Name, long name and units of one output field.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldAttributes {
    pub name: &'static str,
    pub long_name: &'static str,
    pub units: &'static str,
}

/// Contents of `attributes.json`.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetAttributes {
    #[serde(flatten)]
    pub global: GlobalAttributes,
    pub dimensions: Dimensions,
    pub variables: Vec<FieldAttributes>,
    pub station_fields: Vec<FieldAttributes>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Dimensions {
    pub time: usize,
    pub station: usize,
}

const STATION_FIELDS: [FieldAttributes; 7] = [
    FieldAttributes {
        name: "latitude",
        long_name: "Latitude",
        units: "degrees north",
    },
    FieldAttributes {
        name: "longitude",
        long_name: "Longitude",
        units: "degrees east",
    },
    FieldAttributes {
        name: "elevation",
        long_name: "Elevation above sea level",
        units: "m",
    },
    FieldAttributes {
        name: "name",
        long_name: "Station name",
        units: "",
    },
    FieldAttributes {
        name: "station_id",
        long_name: "Station USAF and WBAN id",
        units: "",
    },
    FieldAttributes {
        name: "country",
        long_name: "Country code",
        units: "",
    },
    FieldAttributes {
        name: "state",
        long_name: "US state",
        units: "",
    },
];

impl DatasetAttributes {
    /// Collects the global attributes, dimensions and field descriptions of `dataset`.
    pub fn from_dataset(dataset: &ConsolidatedDataset) -> Self {
        let (time, station) = dataset.shape();
        Self {
            global: dataset.global_attributes().clone(),
            dimensions: Dimensions { time, station },
            variables: Variable::ALL
                .iter()
                .map(|v| FieldAttributes {
                    name: v.name(),
                    long_name: v.long_name(),
                    units: v.units(),
                })
                .collect(),
            station_fields: STATION_FIELDS.to_vec(),
        }
    }
}

/// Writes `observations.parquet` (one row per time and station, missing readings
/// null), `stations.parquet` (one row per station) and `attributes.json`.
#[derive(Debug, Clone, Copy)]
pub struct ParquetDatasetWriter {
    compression: ParquetCompression,
}

impl ParquetDatasetWriter {
    /// A writer using Snappy compression.
    pub fn new() -> Self {
        Self {
            compression: ParquetCompression::Snappy,
        }
    }

    /// Replaces the Parquet compression codec.
    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Long form of the dense matrix: `time`, `station`, one column per variable.
    pub fn observations_frame(dataset: &ConsolidatedDataset) -> PolarsResult<DataFrame> {
        let (rows, cols) = dataset.shape();
        let mut times = Vec::with_capacity(rows * cols);
        let mut stations = Vec::with_capacity(rows * cols);
        for t in dataset.times() {
            for s in dataset.stations() {
                times.push(t.timestamp_millis());
                stations.push(s.to_string());
            }
        }

        let time = Series::new("time".into(), times)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        let mut columns: Vec<Column> = vec![time.into(), Column::new("station".into(), stations)];
        for variable in Variable::ALL {
            let values: Vec<Option<f64>> = dataset
                .variable(variable)
                .as_slice()
                .iter()
                .map(|v| (!v.is_nan()).then_some(*v))
                .collect();
            columns.push(Column::new(variable.name().into(), values));
        }
        DataFrame::new(columns)
    }

    /// Station attributes, one row per station in dataset order.
    pub fn stations_frame(dataset: &ConsolidatedDataset) -> PolarsResult<DataFrame> {
        let a = dataset.attributes();
        let nullable = |values: &[f64]| -> Vec<Option<f64>> {
            values.iter().map(|v| (!v.is_nan()).then_some(*v)).collect()
        };
        DataFrame::new(vec![
            Column::new("station_id".into(), a.station_id.clone()),
            Column::new("usaf".into(), a.usaf.clone()),
            Column::new("wban".into(), a.wban.clone()),
            Column::new("name".into(), a.name.clone()),
            Column::new("country".into(), a.country.clone()),
            Column::new("state".into(), a.state.clone()),
            Column::new("latitude".into(), nullable(&a.latitude)),
            Column::new("longitude".into(), nullable(&a.longitude)),
            Column::new("elevation".into(), nullable(&a.elevation)),
        ])
    }

    fn write_parquet(&self, mut df: DataFrame, path: &Path) -> Result<(), WriteError> {
        let file = File::create(path).map_err(|e| WriteError::Io(path.to_path_buf(), e))?;
        ParquetWriter::new(file)
            .with_compression(self.compression)
            .finish(&mut df)
            .map_err(|e| WriteError::Polars(path.to_path_buf(), e))?;
        Ok(())
    }
}

impl Default for ParquetDatasetWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetWriter for ParquetDatasetWriter {
    fn write(&self, dataset: &ConsolidatedDataset, dir: &Path) -> Result<Vec<PathBuf>, WriteError> {
        std::fs::create_dir_all(dir).map_err(|e| WriteError::Io(dir.to_path_buf(), e))?;

        let observations = dir.join(OBSERVATIONS_FILE);
        let df = Self::observations_frame(dataset)
            .map_err(|e| WriteError::Polars(observations.clone(), e))?;
        self.write_parquet(df, &observations)?;

        let stations = dir.join(STATIONS_FILE);
        let df =
            Self::stations_frame(dataset).map_err(|e| WriteError::Polars(stations.clone(), e))?;
        self.write_parquet(df, &stations)?;

        let attributes = dir.join(ATTRIBUTES_FILE);
        let json = serde_json::to_string_pretty(&DatasetAttributes::from_dataset(dataset))?;
        std::fs::write(&attributes, json).map_err(|e| WriteError::Io(attributes.clone(), e))?;

        let (rows, cols) = dataset.shape();
        info!(
            "Wrote {} timestamps x {} stations to {}",
            rows,
            cols,
            dir.display()
        );
        Ok(vec![observations, stations, attributes])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::consolidate::ConsolidationEngine;
    use crate::types::observation::{ObservationRecord, StationSeries, VARIABLE_COUNT};
    use crate::types::station::{Location, Station};
    use crate::types::station_id::StationId;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn dataset() -> ConsolidatedDataset {
        let stations: Vec<Station> = ["000001", "000002"]
            .iter()
            .map(|usaf| Station {
                id: StationId::new(*usaf, "99999").unwrap(),
                name: format!("STATION {usaf}"),
                country: "US".to_string(),
                state: "CO".to_string(),
                call: String::new(),
                location: Location {
                    latitude: 39.7,
                    longitude: -104.9,
                    elevation: f64::NAN,
                },
                begin: None,
                end: None,
            })
            .collect();
        let record = |h: u32, v: f64| ObservationRecord {
            time: Utc.with_ymd_and_hms(2020, 7, 1, h, 0, 0).unwrap(),
            values: [v; VARIABLE_COUNT],
        };
        let series = vec![
            StationSeries::new(stations[0].id.clone(), vec![record(0, 1.0), record(1, 2.0)]),
            StationSeries::new(stations[1].id.clone(), vec![record(1, 3.0), record(2, 4.0)]),
        ];
        ConsolidationEngine::new(GlobalAttributes::new("https://example.org/isd-lite"))
            .consolidate(&series, &stations)
            .unwrap()
            .with_region("CO")
    }

    #[test]
    fn test_observations_frame_is_long_form_with_nulls() {
        let df = ParquetDatasetWriter::observations_frame(&dataset()).unwrap();
        assert_eq!(df.height(), 6);
        assert_eq!(df.width(), 2 + VARIABLE_COUNT);
        assert_eq!(df.column("T").unwrap().null_count(), 2);
        assert!(matches!(
            df.column("time").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, _)
        ));
    }

    #[test]
    fn test_write_creates_all_outputs() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let written = ParquetDatasetWriter::new().write(&dataset(), &out).unwrap();

        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));

        let stations = ParquetReader::new(File::open(out.join(STATIONS_FILE)).unwrap())
            .finish()
            .unwrap();
        assert_eq!(stations.height(), 2);
        assert_eq!(stations.column("elevation").unwrap().null_count(), 2);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(ATTRIBUTES_FILE)).unwrap())
                .unwrap();
        assert_eq!(json["URL"], "https://example.org/isd-lite");
        assert_eq!(json["region"], "CO");
        assert_eq!(json["dimensions"]["time"], 3);
        assert_eq!(json["variables"][4]["name"], "WS");
        assert_eq!(json["variables"][4]["units"], "m s-1");
    }
}

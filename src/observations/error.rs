use crate::types::station_id::StationId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Archive '{path}' does not exist, download it first")]
    MissingArchive { path: PathBuf },

    #[error("Malformed record in '{path}' at line {line}: {reason}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Failed to read archive '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("Got {series} station series but {stations} station attribute rows")]
    InconsistentInput { series: usize, stations: usize },

    #[error("Series {index} belongs to {series} but its attributes describe {attributes}")]
    StationMismatch {
        index: usize,
        series: StationId,
        attributes: StationId,
    },

    #[error("Station {0} appears more than once")]
    DuplicateStation(StationId),
}

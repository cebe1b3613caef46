//! Parsing of ISD-Lite station-year archives.
//!
//! Each line holds 12 whitespace separated integers: year, month, day, hour (UTC)
//! followed by the eight raw observation fields in [`Variable::ALL`] order. Archives
//! are normally gzip compressed; plain text is accepted as well.

use crate::observations::error::DecodeError;
use crate::remote::locator::ResourceLocator;
use crate::types::observation::{ObservationRecord, StationSeries, Variable, VARIABLE_COUNT};
use crate::types::station_id::StationId;
use crate::types::year_range::YearRange;
use async_compression::tokio::bufread::GzipDecoder;
use chrono::{NaiveDate, TimeZone, Utc};
use log::debug;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::task;

/// Raw value of the missing-data sentinel in ISD-Lite files.
pub const DEFAULT_MISSING_VALUE: i64 = -9999;

/// Raw value encoding a trace amount in the precipitation fields.
pub const TRACE_PRECIPITATION: i64 = -1;

const FIELD_COUNT: usize = 4 + VARIABLE_COUNT;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads archives from a cache directory into typed records.
///
/// Decoding never touches the network: an archive that is not on disk is reported
/// as [`DecodeError::MissingArchive`].
#[derive(Debug, Clone)]
pub struct ObservationDecoder {
    cache_dir: PathBuf,
    missing_value: i64,
}

impl ObservationDecoder {
    /// Creates a decoder reading archives from `cache_dir`.
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - Directory holding archives named like [`ResourceLocator::file_name`].
    /// * `missing_value` - Raw value marking missing readings, usually
    ///   [`DEFAULT_MISSING_VALUE`].
    pub fn new(cache_dir: impl Into<PathBuf>, missing_value: i64) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            missing_value,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Decodes one station-year archive.
    pub async fn decode(&self, path: &Path) -> Result<Vec<ObservationRecord>, DecodeError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DecodeError::MissingArchive {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(DecodeError::Io(path.to_path_buf(), e)),
        };

        let text = if raw.starts_with(&GZIP_MAGIC) {
            let mut decoder = GzipDecoder::new(raw.as_slice());
            // Archives may be several concatenated gzip members.
            decoder.multiple_members(true);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .await
                .map_err(|e| DecodeError::Io(path.to_path_buf(), e))?;
            decompressed
        } else {
            raw
        };

        let owned_path = path.to_path_buf();
        let missing_value = self.missing_value;
        let records = task::spawn_blocking(move || {
            let text = String::from_utf8_lossy(&text);
            parse_archive(&owned_path, &text, missing_value)
        })
        .await??;
        debug!("Decoded {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Decodes and concatenates the archives of `station` for every year of `years`,
    /// in year order.
    pub async fn decode_range(
        &self,
        station: &StationId,
        years: YearRange,
    ) -> Result<StationSeries, DecodeError> {
        let mut records = Vec::new();
        for year in years.years() {
            let path = ResourceLocator::local_path(&self.cache_dir, year, station);
            records.extend(self.decode(&path).await?);
        }
        Ok(StationSeries::new(station.clone(), records))
    }
}

/// Parses the text of an archive. `path` is only used in error messages.
///
/// Blank lines are ignored.
pub fn parse_archive(
    path: &Path,
    text: &str,
    missing_value: i64,
) -> Result<Vec<ObservationRecord>, DecodeError> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = |reason: String| DecodeError::MalformedLine {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        };

        let mut raw = [0i64; FIELD_COUNT];
        let mut fields = line.split_whitespace();
        for (i, slot) in raw.iter_mut().enumerate() {
            let field = fields
                .next()
                .ok_or_else(|| malformed(format!("expected {FIELD_COUNT} fields, found {i}")))?;
            *slot = field
                .parse()
                .map_err(|_| malformed(format!("field {} is not an integer: '{}'", i + 1, field)))?;
        }
        if fields.next().is_some() {
            return Err(malformed(format!("more than {FIELD_COUNT} fields")));
        }

        let time = u32::try_from(raw[1])
            .ok()
            .zip(u32::try_from(raw[2]).ok())
            .zip(u32::try_from(raw[3]).ok())
            .and_then(|((month, day), hour)| {
                let year = i32::try_from(raw[0]).ok()?;
                NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)
            })
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| {
                malformed(format!(
                    "invalid timestamp {} {} {} {}",
                    raw[0], raw[1], raw[2], raw[3]
                ))
            })?;

        let mut values = [f64::NAN; VARIABLE_COUNT];
        for variable in Variable::ALL {
            values[variable.index()] = resolve(variable, raw[4 + variable.index()], missing_value);
        }
        records.push(ObservationRecord { time, values });
    }
    Ok(records)
}

/// Applies the trace, missing and scaling rules to one raw field.
fn resolve(variable: Variable, raw: i64, missing_value: i64) -> f64 {
    if variable.is_precipitation() && raw == TRACE_PRECIPITATION {
        return 0.0;
    }
    if raw == missing_value {
        return f64::NAN;
    }
    if variable.is_scaled() {
        raw as f64 / 10.0
    } else {
        raw as f64
    }
}

//! CSV parser for time-series query results.
//!
//! The query endpoint answers with one or more CSV tables separated by blank
//! lines. Each table repeats its own header row, and annotated responses
//! prefix tables with `#datatype`-style rows which are skipped here.

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;
use tracing::debug;

/// Column holding the sample instant.
pub const TIME_COLUMN: &str = "_time";
/// Column holding the encoded occupancy value.
pub const VALUE_COLUMN: &str = "_value";
/// Default tag column identifying the sending device.
pub const DEFAULT_DEVICE_COLUMN: &str = "pi-id";

/// One row of the query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub encoded_value: u64,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("query result has no `{0}` column")]
    MissingColumn(String),
    #[error("row {row}: cannot parse timestamp {value:?}")]
    Timestamp { row: usize, value: String },
    #[error("row {row}: cannot parse occupancy value {value:?}")]
    Value { row: usize, value: String },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    time: usize,
    value: usize,
    device: usize,
}

impl Columns {
    fn from_header(header: &StringRecord, device_column: &str) -> Result<Self, ParseError> {
        let find = |name: &str| header.iter().position(|field| field == name);
        Ok(Self {
            time: find(TIME_COLUMN).ok_or_else(|| ParseError::MissingColumn(TIME_COLUMN.into()))?,
            value: find(VALUE_COLUMN)
                .ok_or_else(|| ParseError::MissingColumn(VALUE_COLUMN.into()))?,
            device: find(device_column)
                .ok_or_else(|| ParseError::MissingColumn(device_column.into()))?,
        })
    }
}

/// Parses a query response body into [`Reading`]s, in response order.
///
/// # Errors
///
/// Returns [`ParseError::MissingColumn`] when a table header lacks the time,
/// value or device column, [`ParseError::Timestamp`] for the first `_time`
/// cell that is not RFC 3339, and [`ParseError::Value`] for any value that is
/// not a non-negative integer.
pub fn parse_readings(body: &str, device_column: &str) -> Result<Vec<Reading>, ParseError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut columns: Option<Columns> = None;
    let mut readings = Vec::new();

    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let row = idx + 1;

        if record.iter().any(|field| field == TIME_COLUMN) {
            columns = Some(Columns::from_header(&record, device_column)?);
            continue;
        }

        let cols = columns.ok_or_else(|| ParseError::MissingColumn(TIME_COLUMN.into()))?;

        let raw_time = record.get(cols.time).unwrap_or_default();
        let timestamp = DateTime::parse_from_rfc3339(raw_time)
            .map_err(|_| ParseError::Timestamp {
                row,
                value: raw_time.to_string(),
            })?
            .with_timezone(&Utc);

        let raw_value = record.get(cols.value).unwrap_or_default();
        let encoded_value = parse_value(raw_value).ok_or_else(|| ParseError::Value {
            row,
            value: raw_value.to_string(),
        })?;

        let device_id = record.get(cols.device).unwrap_or_default().to_string();

        readings.push(Reading {
            timestamp,
            device_id,
            encoded_value,
        });
    }

    debug!(rows = readings.len(), "Parsed query result");
    Ok(readings)
}

fn parse_value(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    let v: f64 = raw.parse().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
        Some(v as u64)
    } else {
        None
    }
}

/// Device and time-window filtering applied before analysis.
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    pub exclude_devices: Vec<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    /// Drops excluded devices and out-of-window rows, then sorts by timestamp.
    pub fn apply(&self, readings: Vec<Reading>) -> Vec<Reading> {
        let before = readings.len();
        let mut kept: Vec<Reading> = readings
            .into_iter()
            .filter(|r| !self.exclude_devices.iter().any(|d| d == &r.device_id))
            .filter(|r| self.start.is_none_or(|s| r.timestamp >= s))
            .filter(|r| self.end.is_none_or(|e| r.timestamp <= e))
            .collect();
        kept.sort_by_key(|r| r.timestamp);

        debug!(before, after = kept.len(), "Filtered readings");
        kept
    }
}

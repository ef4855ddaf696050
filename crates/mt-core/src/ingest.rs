//! CSV ingestion of the cleaned location-event table.
//!
//! Required columns: `patient_id`, `timestamp`, `location_name`. Any other
//! column (a precomputed `date`, sensor ids, ...) is ignored; the calendar
//! date is always derived from the timestamp.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use mt_common::{Error, PatientId, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::events::{EventLog, LocationEvent};

pub const REQUIRED_COLUMNS: [&str; 3] = ["patient_id", "timestamp", "location_name"];

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Deserialize)]
struct EventRow {
    patient_id: String,
    timestamp: String,
    location_name: String,
}

/// Read an event log from a CSV file.
pub fn read_events_csv(path: &Path) -> Result<EventLog> {
    let file = std::fs::File::open(path)?;
    let log = read_events(file)?;
    info!(path = %path.display(), events = log.len(), "event log loaded");
    Ok(log)
}

/// Read an event log from any CSV source with a header row.
pub fn read_events<R: Read>(reader: R) -> Result<EventLog> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_error)?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    let mut events = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: EventRow = record.deserialize(Some(&headers)).map_err(csv_error)?;
        events.push(parse_row(row, line)?);
    }
    debug!(rows = events.len(), "csv rows parsed");
    Ok(EventLog::new(events))
}

fn parse_row(row: EventRow, line: u64) -> Result<LocationEvent> {
    let patient_id = PatientId::parse(&row.patient_id).ok_or_else(|| Error::InvalidRecord {
        line,
        message: "empty patient_id".to_string(),
    })?;
    if row.location_name.is_empty() {
        return Err(Error::InvalidRecord {
            line,
            message: "empty location_name".to_string(),
        });
    }
    let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| Error::InvalidRecord {
        line,
        message: format!("unrecognised timestamp '{}'", row.timestamp),
    })?;
    Ok(LocationEvent {
        patient_id,
        timestamp,
        location: row.location_name,
    })
}

/// Parse a timestamp, accepting space or `T` separators, optional
/// fractional seconds, and RFC 3339 offsets (kept as local wall-clock time).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

fn csv_error(err: csv::Error) -> Error {
    match err.position() {
        Some(pos) => Error::InvalidRecord {
            line: pos.line(),
            message: err.to_string(),
        },
        None => Error::Input(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_events_basic() {
        let csv = "patient_id,timestamp,location_name,date\n\
                   p1,2019-06-28 08:00:00,Bedroom,2019-06-28\n\
                   p1,2019-06-28 08:05:00,Kitchen,2019-06-28\n";
        let log = read_events(csv.as_bytes()).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[1].location, "Kitchen");
    }

    #[test]
    fn test_column_order_irrelevant() {
        let csv = "location_name,patient_id,timestamp\nHallway,p2,2019-06-28T09:00:00\n";
        let log = read_events(csv.as_bytes()).unwrap();
        assert_eq!(log.events()[0].patient_id, PatientId::new("p2"));
    }

    #[test]
    fn test_missing_column() {
        let csv = "patient_id,timestamp\np1,2019-06-28 08:00:00\n";
        let err = read_events(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column } if column == "location_name"));
    }

    #[test]
    fn test_bad_timestamp_reports_line() {
        let csv = "patient_id,timestamp,location_name\n\
                   p1,2019-06-28 08:00:00,Bedroom\n\
                   p1,yesterday,Kitchen\n";
        let err = read_events(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { line: 3, .. }));
    }

    #[test]
    fn test_empty_location_rejected() {
        let csv = "patient_id,timestamp,location_name\np1,2019-06-28 08:00:00, \n";
        let err = read_events(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { line: 2, .. }));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2019-06-28 08:00:00").is_some());
        assert!(parse_timestamp("2019-06-28 08:00:00.250").is_some());
        assert!(parse_timestamp("2019-06-28T08:00:00").is_some());
        assert!(parse_timestamp("2019-06-28 08:00").is_some());
        assert!(parse_timestamp("2019-06-28T08:00:00+01:00").is_some());
        assert!(parse_timestamp("28/06/2019").is_none());
    }
}

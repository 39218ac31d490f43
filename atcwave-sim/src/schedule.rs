//! Binary schedule-file reader — §1 names this as a defined-interface
//! external collaborator but gives no record format anywhere in the spec
//! or the source it was distilled from. This is a minimal, documented
//! stand-in: fixed-width records of a UTC timestamp, a tail number, and a
//! flight number, each yielding one flight-plan event. Swap the
//! `ScheduleSource` implementation out if a real format shows up.

use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const RECORD_LEN: usize = 8 + 8 + 8; // i64 timestamp, 8-byte tail, 8-byte flight number

#[derive(Debug, Clone)]
pub struct ScheduleEvent {
    pub simulated_time: DateTime<Utc>,
    pub tail_number: String,
    pub flight_number: String,
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("failed to read schedule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("schedule file {path} is not a multiple of the {RECORD_LEN}-byte record length")]
    Truncated { path: String },
}

pub trait ScheduleSource {
    fn events(&self) -> &[ScheduleEvent];
}

pub struct FixedWidthSchedule {
    events: Vec<ScheduleEvent>,
}

impl ScheduleSource for FixedWidthSchedule {
    fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }
}

fn trim_padding(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

impl FixedWidthSchedule {
    pub fn load(path: &Path) -> Result<Self, ScheduleError> {
        let mut bytes = Vec::new();
        std::fs::File::open(path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(|source| ScheduleError::Io {
                path: path.display().to_string(),
                source,
            })?;

        if bytes.len() % RECORD_LEN != 0 {
            return Err(ScheduleError::Truncated {
                path: path.display().to_string(),
            });
        }

        let events = bytes
            .chunks_exact(RECORD_LEN)
            .map(|record| {
                let timestamp = i64::from_le_bytes(record[0..8].try_into().unwrap());
                let tail_number = trim_padding(&record[8..16]);
                let flight_number = trim_padding(&record[16..24]);
                ScheduleEvent {
                    simulated_time: DateTime::from_timestamp(timestamp, 0).unwrap_or_default(),
                    tail_number,
                    flight_number,
                }
            })
            .collect();

        Ok(Self { events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_record(buf: &mut Vec<u8>, timestamp: i64, tail: &str, flight: &str) {
        buf.extend_from_slice(&timestamp.to_le_bytes());
        let mut tail_field = [0u8; 8];
        tail_field[..tail.len()].copy_from_slice(tail.as_bytes());
        buf.extend_from_slice(&tail_field);
        let mut flight_field = [0u8; 8];
        flight_field[..flight.len()].copy_from_slice(flight.as_bytes());
        buf.extend_from_slice(&flight_field);
    }

    #[test]
    fn parses_one_record() {
        let mut buf = Vec::new();
        write_record(&mut buf, 1_700_000_000, "N12345", "UAL100");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&buf).unwrap();
        let schedule = FixedWidthSchedule::load(file.path()).unwrap();
        assert_eq!(schedule.events().len(), 1);
        assert_eq!(schedule.events()[0].tail_number, "N12345");
        assert_eq!(schedule.events()[0].flight_number, "UAL100");
    }

    #[test]
    fn truncated_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 10]).unwrap();
        assert!(matches!(
            FixedWidthSchedule::load(file.path()),
            Err(ScheduleError::Truncated { .. })
        ));
    }
}

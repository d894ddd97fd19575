//! Event log export.

use crate::error::SimError;
use chrono::DateTime;
use clap::ValueEnum;
use mopred_core::{DetectionEvent, csv};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const EVENT_LOG_HEADER: &str = "entity_id,timestamp,datetime,sensor_id,region,lane,lat,lon,brand,model,type,color,infraction_count,anomaly_flag";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EventLogFormat {
    Csv,
    JsonLines,
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn readable_timestamp(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn write_events<W: Write>(
    out: &mut W,
    events: &[DetectionEvent],
    format: EventLogFormat,
) -> Result<(), SimError> {
    match format {
        EventLogFormat::Csv => {
            writeln!(out, "{EVENT_LOG_HEADER}")?;
            for e in events {
                writeln!(
                    out,
                    "{},{},{},{},{},{},{:.6},{:.6},{},{},{},{},{},{}",
                    csv::field(&e.entity_id),
                    e.timestamp_ms,
                    readable_timestamp(e.timestamp_ms),
                    csv::field(&e.sensor_id),
                    csv::field(&e.region),
                    e.lane,
                    e.lat,
                    e.lon,
                    csv::field(&e.attributes.brand),
                    csv::field(&e.attributes.model),
                    csv::field(&e.attributes.vehicle_type),
                    csv::field(&e.attributes.color),
                    e.infraction_count,
                    e.anomaly_flag,
                )?;
            }
        }
        EventLogFormat::JsonLines => {
            for e in events {
                serde_json::to_writer(&mut *out, e)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

pub fn write_events_to_path(
    path: impl AsRef<Path>,
    events: &[DetectionEvent],
    format: EventLogFormat,
) -> Result<(), SimError> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    write_events(&mut out, events, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::tests::stream;

    #[test]
    fn test_readable_timestamp() {
        assert_eq!(readable_timestamp(1_735_689_600_000), "2025-01-01 00:00:00");
    }

    #[test]
    fn test_csv_layout() {
        let mut events = stream(2, -27.5, -48.5);
        events[1].region = "São José, SC".to_string();
        let mut buf = Vec::new();
        write_events(&mut buf, &events, EventLogFormat::Csv).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], EVENT_LOG_HEADER);
        assert!(lines[1].starts_with("E0000,0,1970-01-01 00:00:00,CAM001,Test,1,-27.500000"));
        assert!(lines[2].contains("\"São José, SC\""));
        assert!(lines[1].ends_with(",0,false"));
    }

    #[test]
    fn test_json_lines_to_file() {
        let events = stream(3, 0.0, 0.0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        write_events_to_path(&path, &events, EventLogFormat::JsonLines).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<DetectionEvent> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed, events);
    }
}

//! File export of reading sequences
//!
//! Pure projections: the caller takes a [`snapshot`](crate::Aggregator::snapshot)
//! (or any other reading slice) and renders it as CSV or JSON. Nothing here
//! touches the live store.
//!
//! ```rust
//! use strainscope_core::export::{export, ExportFormat};
//! use strainscope_core::Reading;
//!
//! let readings = vec![Reading::new("SG-01", 1_700_000_000_000, 152.25, 81_234, 87, 23.5)];
//! let format: ExportFormat = "CSV".parse()?;
//! let doc = export(&readings, "SG-01", format, 1_700_000_100_000)?;
//! assert_eq!(doc.content_type, "text/csv");
//! assert!(doc.filename.starts_with("daq_data_SG-01_"));
//! # Ok::<(), strainscope_core::ExportError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::errors::ExportError;
use crate::reading::Reading;
use crate::time::Timestamp;

/// CSV column names, in order
pub const CSV_HEADER: [&str; 7] = [
    "timestamp",
    "strain_value_microstrains",
    "raw_adc_value",
    "sensor_id",
    "battery_level_percent",
    "temperature_celsius",
    "checksum",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Rendered export ready to be written or served
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

#[derive(Serialize)]
struct ExportMetadata<'a> {
    exported_at: String,
    total_readings: usize,
    sensor_id: &'a str,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    metadata: ExportMetadata<'a>,
    readings: &'a [Reading],
}

/// Render `readings` in `format`, stamped with `exported_at`
pub fn export(
    readings: &[Reading],
    sensor_id: &str,
    format: ExportFormat,
    exported_at: Timestamp,
) -> Result<ExportDocument, ExportError> {
    let bytes = match format {
        ExportFormat::Csv => to_csv(readings)?,
        ExportFormat::Json => to_json(readings, sensor_id, exported_at)?,
    };

    Ok(ExportDocument {
        bytes,
        content_type: format.content_type(),
        filename: export_filename(sensor_id, format, exported_at),
    })
}

pub fn to_csv(readings: &[Reading]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for reading in readings {
        writer.write_record([
            rfc3339(reading.timestamp()),
            format!("{:.6}", reading.value()),
            reading.raw_value().to_string(),
            reading.sensor_id().to_string(),
            reading.battery_percent().to_string(),
            format!("{:.2}", reading.temperature_c()),
            reading.integrity_tag().to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))
}

/// Pretty-printed JSON with a metadata header
pub fn to_json(
    readings: &[Reading],
    sensor_id: &str,
    exported_at: Timestamp,
) -> Result<Vec<u8>, ExportError> {
    let document = JsonExport {
        metadata: ExportMetadata {
            exported_at: rfc3339(exported_at),
            total_readings: readings.len(),
            sensor_id,
        },
        readings,
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

/// Readings with `start <= timestamp <= end`; open bounds when `None`
pub fn within_window(
    readings: &[Reading],
    start: Option<Timestamp>,
    end: Option<Timestamp>,
) -> Vec<Reading> {
    readings
        .iter()
        .filter(|r| start.map_or(true, |s| r.timestamp() >= s))
        .filter(|r| end.map_or(true, |e| r.timestamp() <= e))
        .cloned()
        .collect()
}

/// `daq_data_<sensor>_<YYYYMMDD_HHMMSS>.<ext>`
pub fn export_filename(sensor_id: &str, format: ExportFormat, at: Timestamp) -> String {
    let stamp = Utc
        .timestamp_millis_opt(at as i64)
        .single()
        .map(|t| t.format("%Y%m%d_%H%M%S").to_string())
        .unwrap_or_else(|| at.to_string());
    format!("daq_data_{}_{}.{}", sensor_id, stamp, format.extension())
}

/// RFC 3339 at second precision, UTC; raw millis if out of range
fn rfc3339(millis: Timestamp) -> String {
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings() -> Vec<Reading> {
        vec![
            Reading::new("SG-01", 1_700_000_000_000, 152.25, 81_234, 87, 23.456),
            Reading::new("SG-01", 1_700_000_001_000, -3.5, -1_200, 86, 23.0),
        ]
    }

    #[test]
    fn format_parsing() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(" JSON ".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(name)) if name == "xml"
        ));
    }

    #[test]
    fn csv_layout() {
        let data = readings();
        let text = String::from_utf8(to_csv(&data).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(
            lines[1],
            format!(
                "2023-11-14T22:13:20Z,152.250000,81234,SG-01,87,23.46,{}",
                data[0].integrity_tag()
            )
        );
        assert!(lines[2].starts_with("2023-11-14T22:13:21Z,-3.500000,-1200,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn json_layout() {
        let bytes = to_json(&readings(), "SG-01", 1_700_000_000_000).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["metadata"]["total_readings"], 2);
        assert_eq!(value["metadata"]["sensor_id"], "SG-01");
        assert_eq!(value["metadata"]["exported_at"], "2023-11-14T22:13:20Z");
        assert_eq!(value["readings"][0]["strain_value"], 152.25);
        assert_eq!(value["readings"][1]["raw_adc_value"], -1200);
    }

    #[test]
    fn document_metadata() {
        let doc = export(&readings(), "SG-01", ExportFormat::Json, 1_700_000_000_000).unwrap();
        assert_eq!(doc.content_type, "application/json");
        assert_eq!(doc.filename, "daq_data_SG-01_20231114_221320.json");
    }

    #[test]
    fn window_filter_is_inclusive() {
        let data = readings();
        assert_eq!(within_window(&data, Some(1_700_000_001_000), None).len(), 1);
        assert_eq!(within_window(&data, None, Some(1_700_000_000_000)).len(), 1);
        assert_eq!(within_window(&data, None, None).len(), 2);
        assert!(within_window(&data, Some(1), Some(0)).is_empty());
    }
}

//! CSV export of the currently displayed readings.
//!
//! Format
//! - Header: field names of the first row, in serialization order.
//! - Numbers are written bare; every other value is JSON-encoded, so strings are quoted and
//!   embedded commas/quotes survive. `null` becomes `""`.
//! - Rows are separated by CRLF with no trailing separator.

use chrono::{DateTime, TimeZone};
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASENAME: &str = "sensor_data";

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Json(serde_json::Error),
    NotAnObject,
}

impl core::fmt::Display for ExportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "io error: {}", e),
            ExportError::Json(e) => write!(f, "json error: {}", e),
            ExportError::NotAnObject => write!(f, "rows must serialize to objects"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            ExportError::Json(e) => Some(e),
            ExportError::NotAnObject => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(value: std::io::Error) -> Self {
        ExportError::Io(value)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(value: serde_json::Error) -> Self {
        ExportError::Json(value)
    }
}

/// `<base>_<YYYYMMDD_HHMMSS>.csv`
pub fn export_filename<Tz: TimeZone>(base: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: core::fmt::Display,
{
    format!("{}_{}.csv", base, now.format("%Y%m%d_%H%M%S"))
}

/// Render rows as CSV text. Returns `None` when there is nothing to export.
pub fn render_csv<T: Serialize>(rows: &[T]) -> Result<Option<String>, ExportError> {
    if rows.is_empty() {
        warn!("No data to export.");
        return Ok(None);
    }

    let objects = rows
        .iter()
        .map(|row| match serde_json::to_value(row)? {
            Value::Object(map) => Ok(map),
            _ => Err(ExportError::NotAnObject),
        })
        .collect::<Result<Vec<Map<String, Value>>, ExportError>>()?;

    let headers: Vec<&String> = objects[0].keys().collect();
    let mut lines = Vec::with_capacity(objects.len() + 1);
    lines.push(headers.iter().map(|h| h.as_str()).collect::<Vec<_>>().join(","));

    for obj in &objects {
        let cells = headers
            .iter()
            .map(|h| obj.get(h.as_str()).map(render_cell).unwrap_or_default())
            .collect::<Vec<_>>();
        lines.push(cells.join(","));
    }

    Ok(Some(lines.join("\r\n")))
}

/// Write the CSV for `rows` into `dir`. Returns the written path, or `None` for an empty set.
pub fn export_csv<T: Serialize, Tz: TimeZone>(
    rows: &[T],
    base: &str,
    dir: &Path,
    now: &DateTime<Tz>,
) -> Result<Option<PathBuf>, ExportError>
where
    Tz::Offset: core::fmt::Display,
{
    let Some(csv) = render_csv(rows)? else {
        return Ok(None);
    };

    fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(base, now));
    fs::write(&path, csv)?;
    info!("Exported {} row(s) to {}", rows.len(), path.display());
    Ok(Some(path))
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Number(n) => format_number(n),
        other => replace_nulls(other.clone()).to_string(),
    }
}

/// Floats print the way a JavaScript number does: integral values without a fractional part
/// (`512.0` -> `512`), `-0` as `0`, and magnitudes from `1e21` up or below `1e-6` in exponent form
/// (`1e+21`, `1.5e-7`).
fn format_number(n: &Number) -> String {
    let Some(f) = n.as_f64().filter(|_| n.is_f64()) else {
        return n.to_string();
    };
    if f == 0.0 {
        return "0".to_string();
    }
    let magnitude = f.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let sci = format!("{:e}", f);
        return match sci.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => sci,
        };
    }
    f.to_string()
}

fn replace_nulls(value: Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::Array(items) => Value::Array(items.into_iter().map(replace_nulls).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, replace_nulls(v))).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reading::SensorReading;
    use chrono::Utc;
    use serde_json::json;

    fn sample(id: &str, temperature: f64) -> SensorReading {
        SensorReading {
            id: id.to_string(),
            datetime: "2024-01-01T10:00:00Z".to_string(),
            temperature,
            humidity: 45.5,
            soil_moisture_percent: 30.25,
            soil_moisture_raw: 512.0,
            extra: Map::new(),
        }
    }

    #[test]
    fn empty_input_is_a_noop() {
        let rows: Vec<SensorReading> = Vec::new();
        assert!(render_csv(&rows).unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        let written = export_csv(&rows, DEFAULT_BASENAME, dir.path(), &Utc::now()).unwrap();
        assert!(written.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn float_edge_cases_match_javascript() {
        let rows = vec![json!({"big": 1e21, "small": 1.5e-7, "neg_zero": -0.0, "plain": 1e20, "tiny": 0.000001})];
        let csv = render_csv(&rows).unwrap().unwrap();
        assert_eq!(
            csv,
            "big,small,neg_zero,plain,tiny\r\n1e+21,1.5e-7,0,100000000000000000000,0.000001"
        );
    }

    #[test]
    fn numbers_bare_strings_quoted() {
        let rows = vec![json!({"a": 1, "b": "x,y"})];
        let csv = render_csv(&rows).unwrap().unwrap();
        assert_eq!(csv, "a,b\r\n1,\"x,y\"");
    }

    #[test]
    fn nulls_and_missing_fields() {
        let rows = vec![
            json!({"a": null, "b": true, "c": {"k": null}}),
            json!({"a": 2.5}),
        ];
        let csv = render_csv(&rows).unwrap().unwrap();
        let lines: Vec<_> = csv.split("\r\n").collect();
        assert_eq!(lines, ["a,b,c", "\"\",true,{\"k\":\"\"}", "2.5,,"]);
    }

    #[test]
    fn reading_header_round_trip() {
        let mut first = sample("-a", 21.23);
        first.extra.insert("battery".to_string(), json!(3.7));
        let rows = vec![first, sample("-b", 22.0)];
        let csv = render_csv(&rows).unwrap().unwrap();

        let header = csv.split("\r\n").next().unwrap();
        let names: Vec<_> = header.split(',').collect();
        assert_eq!(
            names,
            [
                "id",
                "datetime",
                "temperature",
                "humidity",
                "soil_moisture_percent",
                "soil_moisture_raw",
                "battery"
            ]
        );
        assert!(csv.contains("\"-a\",\"2024-01-01T10:00:00Z\",21.23,45.5,30.25,512,3.7"));
        assert!(csv.ends_with("\"-b\",\"2024-01-01T10:00:00Z\",22,45.5,30.25,512,"));
        assert!(!csv.ends_with("\r\n"));
    }

    #[test]
    fn strings_with_quotes_are_escaped() {
        let rows = vec![json!({"note": "he said \"hi\""})];
        let csv = render_csv(&rows).unwrap().unwrap();
        assert_eq!(csv, "note\r\n\"he said \\\"hi\\\"\"");
    }

    #[test]
    fn filename_uses_export_time() {
        let now = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(export_filename("sensor_data", &now), "sensor_data_20240203_040506.csv");
    }

    #[test]
    fn writes_file_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let rows = vec![sample("-a", 20.0)];
        let path = export_csv(&rows, "garden", dir.path(), &now).unwrap().unwrap();
        assert_eq!(path, dir.path().join("garden_20240203_040506.csv"));
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("id,datetime,"));
    }

    #[test]
    fn scalar_rows_are_rejected() {
        let err = render_csv(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ExportError::NotAnObject));
    }
}

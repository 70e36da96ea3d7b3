//! Models for the sensor collection served by the realtime database.
//!
//! Notes
//! - The store returns an object mapping push keys to record objects; the key becomes `id`.
//! - `datetime` is kept verbatim as delivered. Parsing happens on demand via [`parse_timestamp`]
//!   because devices are not consistent about offsets and a bad timestamp must not drop a record.
//! - Unknown record fields are preserved in `extra` (declaration order is kept for CSV export).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =====================
// Readings
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub id: String,
    pub datetime: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture_percent: f64,
    pub soil_moisture_raw: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SensorReading {
    /// Parsed `datetime`; naive timestamps are read as wall-clock time in `tz`.
    pub fn timestamp<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.datetime, tz)
    }
}

// Tried in order after RFC 3339.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 style timestamp.
///
/// - Full RFC 3339 (with offset) is taken as-is.
/// - Date + time without an offset is local time in `tz`.
/// - A bare date is midnight UTC.
pub fn parse_timestamp<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Stable ascending sort by parsed timestamp. Unparseable timestamps sort first.
pub fn sort_readings<Tz: TimeZone>(readings: &mut [SensorReading], tz: &Tz) {
    readings.sort_by_cached_key(|r| r.timestamp(tz));
}

// =====================
// Response decoding
// =====================

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    Shape(&'static str),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "invalid json: {}", e),
            DecodeError::Shape(s) => write!(f, "unexpected response shape: {}", s),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Json(e) => Some(e),
            DecodeError::Shape(_) => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        DecodeError::Json(value)
    }
}

/// Decode a collection body into readings sorted by time.
///
/// An empty body or `null` means the collection does not exist yet and yields no readings.
/// Individual records that do not match [`SensorReading`] are skipped with a warning.
pub fn decode_readings<Tz: TimeZone>(body: &str, tz: &Tz) -> Result<Vec<SensorReading>, DecodeError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let records = match serde_json::from_str::<Value>(body)? {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        _ => return Err(DecodeError::Shape("expected an object keyed by record id")),
    };

    let mut readings = Vec::with_capacity(records.len());
    for (key, record) in records {
        match serde_path_to_error::deserialize::<_, SensorReading>(record) {
            Ok(mut reading) => {
                reading.id = key;
                readings.push(reading);
            }
            Err(e) => warn!("Skipping record {}: field `{}`: {}", key, e.path(), e.inner()),
        }
    }

    sort_readings(&mut readings, tz);
    Ok(readings)
}

// =====================
// Connection state and targets
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Error => "Error",
        }
    }
}

/// Where readings are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Complete collection URL.
    Url(String),
    /// Project identifier substituted into the URL template.
    Project(String),
    /// Synthetic in-process readings.
    Demo,
}

pub const PROJECT_PLACEHOLDER: &str = "{project}";

impl Target {
    /// Interpret free-form user input: anything with a scheme is a URL, everything else a
    /// project identifier. Blank input yields `None`.
    pub fn from_input(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Some(Target::Url(trimmed.to_string()))
        } else {
            Some(Target::Project(trimmed.to_string()))
        }
    }

    pub fn resolve_url(&self, template: &str) -> Option<String> {
        match self {
            Target::Url(url) => Some(url.clone()),
            Target::Project(p) => Some(template.replace(PROJECT_PLACEHOLDER, p)),
            Target::Demo => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Target::Url(url) => url.clone(),
            Target::Project(p) => format!("project {}", p),
            Target::Demo => "demo data".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;

    #[test]
    fn null_and_empty_bodies_are_empty_collections() {
        assert!(decode_readings("null", &Utc).unwrap().is_empty());
        assert!(decode_readings("", &Utc).unwrap().is_empty());
        assert!(decode_readings("  \n", &Utc).unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = decode_readings("{\"a\": ", &Utc).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
        let err = decode_readings("[1, 2]", &Utc).unwrap_err();
        assert!(matches!(err, DecodeError::Shape(_)));
    }

    #[test]
    fn decodes_and_sorts_by_time() {
        let body = json!({
            "-b": {"datetime": "2024-01-01T12:00:00Z", "temperature": 22.0, "humidity": 40.0,
                   "soil_moisture_percent": 31.5, "soil_moisture_raw": 600},
            "-a": {"datetime": "2024-01-01T10:00:00Z", "temperature": 21.0, "humidity": 41.0,
                   "soil_moisture_percent": 30.0, "soil_moisture_raw": 610, "battery": 3.7},
            "-c": {"datetime": "2024-01-01T11:00:00+00:00", "temperature": 21.5, "humidity": 42.0,
                   "soil_moisture_percent": 30.5, "soil_moisture_raw": 605},
        })
        .to_string();

        let readings = decode_readings(&body, &Utc).unwrap();
        let ids: Vec<_> = readings.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["-a", "-c", "-b"]);
        assert_eq!(readings[0].extra.get("battery"), Some(&json!(3.7)));
        assert_eq!(readings[0].soil_moisture_raw, 610.0);

        let stamps: Vec<_> = readings.iter().map(|r| r.timestamp(&Utc)).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn skips_records_with_missing_fields() {
        let body = json!({
            "ok": {"datetime": "2024-01-01T10:00:00Z", "temperature": 21.0, "humidity": 41.0,
                   "soil_moisture_percent": 30.0, "soil_moisture_raw": 610},
            "bad": {"datetime": "2024-01-01T11:00:00Z", "temperature": "warm"},
        })
        .to_string();
        let readings = decode_readings(&body, &Utc).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].id, "ok");
    }

    #[test]
    fn key_wins_over_embedded_id() {
        let body = json!({
            "key1": {"id": "other", "datetime": "2024-01-01T10:00:00Z", "temperature": 21.0,
                     "humidity": 41.0, "soil_moisture_percent": 30.0, "soil_moisture_raw": 610},
        })
        .to_string();
        let readings = decode_readings(&body, &Utc).unwrap();
        assert_eq!(readings[0].id, "key1");
    }

    #[test]
    fn unparseable_timestamps_sort_first_and_are_kept() {
        let body = json!({
            "x": {"datetime": "2024-01-01T10:00:00Z", "temperature": 1.0, "humidity": 1.0,
                  "soil_moisture_percent": 1.0, "soil_moisture_raw": 1},
            "y": {"datetime": "not a date", "temperature": 2.0, "humidity": 2.0,
                  "soil_moisture_percent": 2.0, "soil_moisture_raw": 2},
        })
        .to_string();
        let readings = decode_readings(&body, &Utc).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].id, "y");
        assert_eq!(readings[0].timestamp(&Utc), None);
    }

    #[test]
    fn timestamp_formats() {
        let cet = FixedOffset::east_opt(3600).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();

        assert_eq!(parse_timestamp("2024-03-05T09:30:00Z", &cet), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T10:30:00+01:00", &Utc), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T10:30:00", &cet), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05 10:30:00.000", &cet), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T10:30", &cet), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-05", &cet),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday", &Utc), None);
        assert_eq!(parse_timestamp("", &Utc), None);
    }

    #[test]
    fn target_from_input() {
        assert_eq!(Target::from_input("   "), None);
        assert_eq!(
            Target::from_input(" garden-42 "),
            Some(Target::Project("garden-42".to_string()))
        );
        let url = "https://example.test/sensors.json";
        assert_eq!(Target::from_input(url), Some(Target::Url(url.to_string())));

        let t = Target::Project("garden-42".to_string());
        assert_eq!(
            t.resolve_url("https://{project}.example.test/sensors.json").as_deref(),
            Some("https://garden-42.example.test/sensors.json")
        );
        assert_eq!(Target::Demo.resolve_url("x"), None);
    }
}

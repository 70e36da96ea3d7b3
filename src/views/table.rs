use crate::models::reading::SensorReading;
use crate::utils::{fixed, format_long};
use chrono::TimeZone;
use std::fmt::Display;

pub const HEADERS: [&str; 5] = [
    "Date & Time",
    "Temperature (°C)",
    "Humidity (%)",
    "Soil Moisture (%)",
    "Soil Moisture (Raw)",
];

pub const NO_DATA_MESSAGE: &str = "No data available for the selected range.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub id: String,
    pub datetime: String,
    pub temperature: String,
    pub humidity: String,
    pub soil_moisture_percent: String,
    pub soil_moisture_raw: String,
}

impl TableRow {
    pub fn cells(&self) -> [&str; 5] {
        [
            &self.datetime,
            &self.temperature,
            &self.humidity,
            &self.soil_moisture_percent,
            &self.soil_moisture_raw,
        ]
    }
}

/// Rows newest first.
pub fn table_rows<Tz: TimeZone>(readings: &[SensorReading], tz: &Tz) -> Vec<TableRow>
where
    Tz::Offset: Display,
{
    readings
        .iter()
        .rev()
        .map(|r| TableRow {
            id: r.id.clone(),
            datetime: format_long(r.timestamp(tz), tz),
            temperature: fixed(r.temperature, 2),
            humidity: fixed(r.humidity, 2),
            soil_moisture_percent: fixed(r.soil_moisture_percent, 2),
            soil_moisture_raw: fixed(r.soil_moisture_raw, 0),
        })
        .collect()
}

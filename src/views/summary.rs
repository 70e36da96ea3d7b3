use crate::models::reading::SensorReading;
use crate::utils::{fixed, format_clock};
use crate::views::PLACEHOLDER;
use chrono::TimeZone;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCard {
    pub title: &'static str,
    /// Formatted value without unit, or the placeholder.
    pub value: String,
    pub unit: &'static str,
}

impl StatCard {
    fn new(title: &'static str, value: Option<String>, unit: &'static str) -> Self {
        StatCard {
            title,
            value: value.unwrap_or_else(|| PLACEHOLDER.to_string()),
            unit,
        }
    }

    /// Value with its unit; the placeholder is shown bare.
    pub fn display(&self) -> String {
        if self.value == PLACEHOLDER {
            self.value.clone()
        } else {
            format!("{}{}", self.value, self.unit)
        }
    }
}

/// Latest-reading cards shown above the charts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatSummary {
    pub temperature: StatCard,
    pub humidity: StatCard,
    pub soil_moisture: StatCard,
    pub last_update: StatCard,
}

impl StatSummary {
    /// Summarise the last reading of an already sorted list.
    pub fn from_readings<Tz: TimeZone>(readings: &[SensorReading], tz: &Tz) -> Self
    where
        Tz::Offset: Display,
    {
        let latest = readings.last();
        StatSummary {
            temperature: StatCard::new("Temperature", latest.map(|r| fixed(r.temperature, 1)), "°C"),
            humidity: StatCard::new("Humidity", latest.map(|r| fixed(r.humidity, 1)), "%"),
            soil_moisture: StatCard::new("Soil Moisture", latest.map(|r| fixed(r.soil_moisture_percent, 1)), "%"),
            last_update: StatCard::new("Last Update", latest.map(|r| format_clock(r.timestamp(tz), tz)), ""),
        }
    }

    pub fn cards(&self) -> [&StatCard; 4] {
        [&self.temperature, &self.humidity, &self.soil_moisture, &self.last_update]
    }
}

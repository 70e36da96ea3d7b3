//! Pure presentation models derived from the filtered reading list.
//!
//! Nothing in here knows about terminals; `dashboard::ui` and [`text`] both draw from a
//! [`DashboardView`].

pub mod chart;
pub mod summary;
pub mod table;
pub mod text;

use crate::models::reading::SensorReading;
use chart::TimeSeriesChart;
use chrono::TimeZone;
use std::fmt::Display;
use summary::StatSummary;
use table::TableRow;

pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub summary: StatSummary,
    pub temp_humidity: Option<TimeSeriesChart>,
    pub soil_moisture: Option<TimeSeriesChart>,
    pub rows: Vec<TableRow>,
}

impl DashboardView {
    pub fn build<Tz: TimeZone>(filtered: &[SensorReading], tz: &Tz) -> Self
    where
        Tz::Offset: Display,
    {
        DashboardView {
            summary: StatSummary::from_readings(filtered, tz),
            temp_humidity: chart::temp_humidity_chart(filtered, tz),
            soil_moisture: chart::soil_moisture_chart(filtered, tz),
            rows: table::table_rows(filtered, tz),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::filter::{DateRange, filter_readings};
    use chrono::{NaiveDate, Utc};
    use serde_json::Map;

    #[test]
    fn single_reading_in_range_shows_everywhere() {
        let readings = vec![SensorReading {
            id: "-a".to_string(),
            datetime: "2024-01-01T10:00:00Z".to_string(),
            temperature: 21.23,
            humidity: 40.0,
            soil_moisture_percent: 30.0,
            soil_moisture_raw: 600.0,
            extra: Map::new(),
        }];
        let range = DateRange::new(NaiveDate::from_ymd_opt(2024, 1, 1), None);
        let filtered = filter_readings(&readings, &range, &Utc);

        let view = DashboardView::build(&filtered, &Utc);
        assert_eq!(view.summary.temperature.value, "21.2");
        assert_eq!(view.rows[0].temperature, "21.23");
        assert_eq!(view.temp_humidity.as_ref().map(|c| c.len()), Some(1));
    }

    #[test]
    fn empty_view() {
        let view = DashboardView::build(&[], &Utc);
        assert!(view.is_empty());
        assert!(view.temp_humidity.is_none());
        assert!(view.soil_moisture.is_none());
        assert_eq!(view.summary.temperature.value, PLACEHOLDER);
    }
}

//! Chart models for the two time-series panels.
//!
//! The x axis is categorical: point `i` sits at `x = i`, like a category axis keyed by the
//! `datetime` string. That keeps readings with unparseable timestamps plottable; their tick and
//! tooltip labels are simply blank.

use crate::models::reading::SensorReading;
use crate::utils::{fixed, format_long, format_tick};
use chrono::TimeZone;
use std::fmt::Display;

pub const NO_DATA_MESSAGE: &str = "No data for selected period";

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: &'static str,
    pub axis_title: &'static str,
    pub unit: &'static str,
    pub points: Vec<(f64, f64)>,
    pub bounds: [f64; 2],
}

impl Series {
    fn new(name: &'static str, axis_title: &'static str, unit: &'static str, values: Vec<f64>) -> Self {
        let bounds = padded_bounds(&values);
        let points = values.into_iter().enumerate().map(|(i, v)| (i as f64, v)).collect();
        Series {
            name,
            axis_title,
            unit,
            points,
            bounds,
        }
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.points.get(index).map(|p| p.1)
    }

    /// Points rescaled from this series' bounds onto `target`, for drawing a secondary axis
    /// series on a single-axis canvas.
    pub fn project_onto(&self, target: [f64; 2]) -> Vec<(f64, f64)> {
        let [lo, hi] = self.bounds;
        let [t_lo, t_hi] = target;
        let span = hi - lo;
        self.points
            .iter()
            .map(|&(x, y)| {
                let frac = if span > 0.0 { (y - lo) / span } else { 0.5 };
                (x, t_lo + frac * (t_hi - t_lo))
            })
            .collect()
    }

    /// Axis labels at the bottom, middle and top of the bounds.
    pub fn axis_labels(&self) -> [String; 3] {
        let [lo, hi] = self.bounds;
        [fixed(lo, 0), fixed((lo + hi) / 2.0, 0), fixed(hi, 0)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub label: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesChart {
    pub title: &'static str,
    pub ticks: Vec<String>,
    pub labels: Vec<String>,
    pub left: Series,
    pub right: Option<Series>,
}

impl TimeSeriesChart {
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        [0.0, self.len().saturating_sub(1).max(1) as f64]
    }

    /// Up to `max` tick labels spread evenly across the axis, first and last included.
    pub fn sampled_ticks(&self, max: usize) -> Vec<String> {
        let n = self.ticks.len();
        if n == 0 || max == 0 {
            return Vec::new();
        }
        if n <= max {
            return self.ticks.clone();
        }
        if max == 1 {
            return vec![self.ticks[n - 1].clone()];
        }
        (0..max)
            .map(|k| self.ticks[k * (n - 1) / (max - 1)].clone())
            .collect()
    }

    pub fn tooltip(&self, index: usize) -> Option<Tooltip> {
        let label = self.labels.get(index)?.clone();
        let mut lines = Vec::with_capacity(2);
        for series in std::iter::once(&self.left).chain(self.right.as_ref()) {
            if let Some(v) = series.value_at(index) {
                lines.push(format!("{}: {} {}", series.name, fixed(v, 1), series.unit));
            }
        }
        Some(Tooltip { label, lines })
    }
}

/// Temperature (left axis) and humidity (right axis). `None` when there is nothing to plot.
pub fn temp_humidity_chart<Tz: TimeZone>(readings: &[SensorReading], tz: &Tz) -> Option<TimeSeriesChart>
where
    Tz::Offset: Display,
{
    if readings.is_empty() {
        return None;
    }
    let (ticks, labels) = axis_labels(readings, tz);
    Some(TimeSeriesChart {
        title: "Temperature & Humidity",
        ticks,
        labels,
        left: Series::new(
            "Temperature",
            "Temp (°C)",
            "°C",
            readings.iter().map(|r| r.temperature).collect(),
        ),
        right: Some(Series::new(
            "Humidity",
            "Humidity (%)",
            "%",
            readings.iter().map(|r| r.humidity).collect(),
        )),
    })
}

/// Soil moisture percentage on a single axis. `None` when there is nothing to plot.
pub fn soil_moisture_chart<Tz: TimeZone>(readings: &[SensorReading], tz: &Tz) -> Option<TimeSeriesChart>
where
    Tz::Offset: Display,
{
    if readings.is_empty() {
        return None;
    }
    let (ticks, labels) = axis_labels(readings, tz);
    Some(TimeSeriesChart {
        title: "Soil Moisture (%)",
        ticks,
        labels,
        left: Series::new(
            "Soil Moisture",
            "Moisture (%)",
            "%",
            readings.iter().map(|r| r.soil_moisture_percent).collect(),
        ),
        right: None,
    })
}

fn axis_labels<Tz: TimeZone>(readings: &[SensorReading], tz: &Tz) -> (Vec<String>, Vec<String>)
where
    Tz::Offset: Display,
{
    readings
        .iter()
        .map(|r| {
            let ts = r.timestamp(tz);
            (format_tick(ts, tz), format_long(ts, tz))
        })
        .unzip()
}

fn padded_bounds(values: &[f64]) -> [f64; 2] {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return [0.0, 1.0];
    }
    let (lo, hi) = (min.floor(), max.ceil());
    if hi - lo < 1.0 { [lo - 1.0, hi + 1.0] } else { [lo, hi] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;

    fn reading(datetime: &str, temperature: f64, humidity: f64, soil: f64) -> SensorReading {
        SensorReading {
            id: datetime.to_string(),
            datetime: datetime.to_string(),
            temperature,
            humidity,
            soil_moisture_percent: soil,
            soil_moisture_raw: 600.0,
            extra: Map::new(),
        }
    }

    #[test]
    fn empty_list_has_no_chart() {
        assert!(temp_humidity_chart(&[], &Utc).is_none());
        assert!(soil_moisture_chart(&[], &Utc).is_none());
    }

    #[test]
    fn ticks_and_tooltips() {
        let readings = vec![
            reading("2024-01-01T10:00:00Z", 21.23, 45.0, 30.0),
            reading("bogus", 22.0, 46.0, 31.0),
            reading("2024-01-01T10:30:00Z", 22.5, 47.0, 32.0),
        ];
        let chart = temp_humidity_chart(&readings, &Utc).unwrap();
        assert_eq!(chart.ticks, ["10:00", "", "10:30"]);
        assert_eq!(chart.left.points[1], (1.0, 22.0));

        let tip = chart.tooltip(0).unwrap();
        assert_eq!(tip.label, "Jan 1, 2024, 10:00:00 AM");
        assert_eq!(tip.lines, ["Temperature: 21.2 °C", "Humidity: 45.0 %"]);

        let blank = chart.tooltip(1).unwrap();
        assert_eq!(blank.label, "");
        assert!(chart.tooltip(3).is_none());

        let soil = soil_moisture_chart(&readings, &Utc).unwrap();
        assert!(soil.right.is_none());
        assert_eq!(soil.tooltip(2).unwrap().lines, ["Soil Moisture: 32.0 %"]);
    }

    #[test]
    fn bounds_are_padded_and_projectable() {
        let readings = vec![
            reading("2024-01-01T10:00:00Z", 20.4, 40.0, 30.0),
            reading("2024-01-01T11:00:00Z", 20.6, 60.0, 30.0),
        ];
        let chart = temp_humidity_chart(&readings, &Utc).unwrap();
        assert_eq!(chart.left.bounds, [20.0, 21.0]);
        let humidity = chart.right.as_ref().unwrap();
        assert_eq!(humidity.bounds, [40.0, 60.0]);
        assert_eq!(humidity.project_onto(chart.left.bounds), vec![(0.0, 20.0), (1.0, 21.0)]);

        let flat = soil_moisture_chart(&readings, &Utc).unwrap();
        assert_eq!(flat.left.bounds, [29.0, 31.0]);
        assert_eq!(flat.left.axis_labels(), ["29", "30", "31"]);
    }

    #[test]
    fn sampled_ticks_keep_endpoints() {
        let readings: Vec<_> = (0..10)
            .map(|i| reading(&format!("2024-01-01T{:02}:00:00Z", i), 20.0, 50.0, 30.0))
            .collect();
        let chart = soil_moisture_chart(&readings, &Utc).unwrap();
        assert_eq!(chart.sampled_ticks(3), ["00:00", "04:00", "09:00"]);
        assert_eq!(chart.sampled_ticks(20).len(), 10);
        assert_eq!(chart.sampled_ticks(1), ["09:00"]);
        assert_eq!(chart.x_bounds(), [0.0, 9.0]);
    }
}

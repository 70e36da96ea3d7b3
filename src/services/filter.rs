use crate::models::reading::SensorReading;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// Calendar-day window selected by the user. `to` is optional; a missing `to` means the single
/// day `from`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        DateRange { from, to }
    }

    pub fn is_active(&self) -> bool {
        self.from.is_some()
    }

    /// Parse `YYYY-MM-DD` or `YYYY-MM-DD..YYYY-MM-DD`. An empty string is the cleared range;
    /// `YYYY-MM-DD..` leaves the upper bound open.
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(DateRange::default());
        }

        let (from_s, to_s) = match trimmed.split_once("..") {
            Some((a, b)) => (a.trim(), Some(b.trim()).filter(|s| !s.is_empty())),
            None => (trimmed, None),
        };
        let from = parse_day(from_s)?;
        let to = to_s.map(parse_day).transpose()?;
        Ok(DateRange {
            from: Some(from),
            to,
        })
    }

    /// Inclusive `[start, end]` in UTC, with day boundaries taken in `tz`.
    /// The end is 23:59:59.999 on the later of `to` and `from`.
    pub fn bounds<Tz: TimeZone>(&self, tz: &Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let from = self.from?;
        let last_day = self.to.map_or(from, |to| to.max(from));

        let start = tz
            .from_local_datetime(&from.and_time(NaiveTime::MIN))
            .earliest()?
            .with_timezone(&Utc);
        let end = tz
            .from_local_datetime(&last_day.and_time(end_of_day()))
            .latest()?
            .with_timezone(&Utc);
        Some((start, end))
    }

    pub fn label(&self) -> String {
        match (self.from, self.to) {
            (None, _) => "All dates".to_string(),
            (Some(from), None) => from.format("%Y-%m-%d").to_string(),
            (Some(from), Some(to)) => format!("{} .. {}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d")),
        }
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid date `{}`, expected YYYY-MM-DD", s))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// Readings inside `range`. Without a lower bound the input is returned unchanged.
/// Readings whose timestamp does not parse never match an active range.
pub fn filter_readings<Tz: TimeZone>(readings: &[SensorReading], range: &DateRange, tz: &Tz) -> Vec<SensorReading> {
    let Some((start, end)) = range.bounds(tz) else {
        return readings.to_vec();
    };

    readings
        .iter()
        .filter(|r| r.timestamp(tz).is_some_and(|ts| ts >= start && ts <= end))
        .cloned()
        .collect()
}

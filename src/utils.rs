use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;

/// `Jan 1, 2024, 10:00:00 AM` in `tz`; blank for a missing timestamp.
pub fn format_long<Tz: TimeZone>(ts: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    format_in(ts, tz, "%b %-d, %Y, %-I:%M:%S %p")
}

/// `HH:MM:SS` in `tz`; blank for a missing timestamp.
pub fn format_clock<Tz: TimeZone>(ts: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    format_in(ts, tz, "%H:%M:%S")
}

/// `HH:MM` in `tz`; blank for a missing timestamp.
pub fn format_tick<Tz: TimeZone>(ts: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    format_in(ts, tz, "%H:%M")
}

fn format_in<Tz: TimeZone>(ts: Option<DateTime<Utc>>, tz: &Tz, fmt: &str) -> String
where
    Tz::Offset: Display,
{
    ts.map(|t| t.with_timezone(tz).format(fmt).to_string())
        .unwrap_or_default()
}

pub fn fixed(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}

//! Synthetic readings for running the dashboard without a database (`--demo`).
//!
//! Produces the same JSON shape the realtime database serves, so the poller decodes it through the
//! normal path. Values follow a daily cycle with a little noise; soil moisture slowly dries out and
//! jumps back up when "watered".

use crate::client::{ClientError, ReadingSource};
use chrono::{DateTime, Duration, Timelike, Utc};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};
use std::f64::consts::PI;

pub const STEP_MINUTES: i64 = 15;
pub const HISTORY_DAYS: i64 = 3;
const SEED: u64 = 0x5E45_0A11_DEAD_BEEF;
const RAW_DRY: f64 = 880.0;
const RAW_WET: f64 = 380.0;
const WATERING_THRESHOLD_PCT: f64 = 22.0;

pub struct FakeSource {
    rng: SmallRng,
    records: Map<String, Value>,
    next_ts: DateTime<Utc>,
    step: Duration,
    seq: u64,
    moisture_pct: f64,
}

impl FakeSource {
    /// Source whose history starts at `start`.
    pub fn new(start: DateTime<Utc>, seed: u64) -> Self {
        FakeSource {
            rng: SmallRng::seed_from_u64(seed),
            records: Map::new(),
            next_ts: align_to_step(start),
            step: Duration::minutes(STEP_MINUTES),
            seq: 0,
            moisture_pct: 55.0,
        }
    }

    /// Demo source seeded with a few days of history.
    pub fn with_history() -> Self {
        let start = Utc::now() - Duration::days(HISTORY_DAYS);
        info!("Demo data: synthesising readings from {}", start);
        Self::new(start, SEED)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append samples for every step up to and including `end`.
    pub fn generate_until(&mut self, end: DateTime<Utc>) {
        while self.next_ts <= end {
            let ts = self.next_ts;
            let record = self.sample(ts);
            self.seq += 1;
            self.records.insert(format!("-demo{:08}", self.seq), record);
            self.next_ts = ts + self.step;
        }
    }

    pub fn body(&self) -> String {
        Value::Object(self.records.clone()).to_string()
    }

    fn sample(&mut self, ts: DateTime<Utc>) -> Value {
        let day_fraction = ts.num_seconds_from_midnight() as f64 / 86_400.0;
        // warmest mid-afternoon, most humid before dawn
        let diurnal = (2.0 * PI * (day_fraction - 0.375)).sin();

        let temperature = 19.5 + 4.5 * diurnal + self.rng.random_range(-0.4..0.4);
        let humidity = (55.0 - 12.0 * diurnal + self.rng.random_range(-2.0..2.0)).clamp(0.0, 100.0);

        let evaporation = 0.08 + 0.06 * diurnal.max(0.0);
        self.moisture_pct -= evaporation + self.rng.random_range(0.0..0.03);
        if self.moisture_pct < WATERING_THRESHOLD_PCT {
            self.moisture_pct = self.rng.random_range(60.0..70.0);
        }
        let soil_moisture_percent = self.moisture_pct.clamp(0.0, 100.0);
        let soil_moisture_raw = (RAW_DRY - (RAW_DRY - RAW_WET) * soil_moisture_percent / 100.0).round();

        json!({
            "datetime": ts.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "temperature": round2(temperature),
            "humidity": round2(humidity),
            "soil_moisture_percent": round2(soil_moisture_percent),
            "soil_moisture_raw": soil_moisture_raw as i64,
        })
    }
}

impl ReadingSource for FakeSource {
    fn fetch(&mut self) -> Result<String, ClientError> {
        self.generate_until(Utc::now());
        Ok(self.body())
    }

    fn describe(&self) -> String {
        "demo data".to_string()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn align_to_step(ts: DateTime<Utc>) -> DateTime<Utc> {
    let minute = ts.minute() as i64;
    let aligned_minute = minute - minute % STEP_MINUTES;
    ts.with_minute(aligned_minute as u32)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reading::decode_readings;
    use chrono::TimeZone;

    #[test]
    fn generates_one_sample_per_step() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 7, 30).unwrap();
        let mut src = FakeSource::new(start, 1);
        src.generate_until(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap());
        // 00:00, 00:15, 00:30, 00:45, 01:00
        assert_eq!(src.len(), 5);

        src.generate_until(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap());
        assert_eq!(src.len(), 5);
    }

    #[test]
    fn body_decodes_through_the_normal_path() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut src = FakeSource::new(start, 7);
        src.generate_until(start + Duration::days(2));

        let readings = decode_readings(&src.body(), &Utc).unwrap();
        assert_eq!(readings.len(), src.len());
        for r in &readings {
            assert!(r.timestamp(&Utc).is_some());
            assert!((0.0..=100.0).contains(&r.humidity));
            assert!((0.0..=100.0).contains(&r.soil_moisture_percent));
            assert!((RAW_WET..=RAW_DRY).contains(&r.soil_moisture_raw));
        }
    }

    #[test]
    fn same_seed_same_data() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::hours(6);
        let mut a = FakeSource::new(start, 42);
        let mut b = FakeSource::new(start, 42);
        a.generate_until(end);
        b.generate_until(end);
        assert_eq!(a.body(), b.body());
    }
}

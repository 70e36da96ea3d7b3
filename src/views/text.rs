//! Plain-text rendering used by `--snapshot`.

use crate::models::reading::ConnectionStatus;
use crate::views::DashboardView;
use crate::views::chart::{NO_DATA_MESSAGE as NO_CHART_DATA, Series, TimeSeriesChart};
use crate::views::table::{HEADERS, NO_DATA_MESSAGE as NO_TABLE_DATA};
use std::fmt::Write;

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 60;

pub struct SnapshotHeader<'a> {
    pub status: ConnectionStatus,
    pub source: &'a str,
    pub range: &'a str,
    pub total: usize,
    pub error: Option<&'a str>,
}

pub fn render(header: &SnapshotHeader<'_>, view: &DashboardView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "SensorView | {} | {}", header.status.label(), header.source);
    let _ = writeln!(
        out,
        "Range: {} ({} of {} reading(s))",
        header.range,
        view.rows.len(),
        header.total
    );
    if let Some(err) = header.error {
        let _ = writeln!(out, "\nConnection Error: {}", err);
        return out;
    }

    out.push('\n');
    let cards = view.summary.cards();
    let line = cards
        .iter()
        .map(|c| format!("{:<16}", c.title))
        .collect::<String>();
    let _ = writeln!(out, "{}", line.trim_end());
    let line = cards
        .iter()
        .map(|c| format!("{:<16}", c.display()))
        .collect::<String>();
    let _ = writeln!(out, "{}", line.trim_end());

    for (title, chart) in [
        ("Temperature & Humidity", view.temp_humidity.as_ref()),
        ("Soil Moisture (%)", view.soil_moisture.as_ref()),
    ] {
        out.push('\n');
        let _ = writeln!(out, "{}", title);
        match chart {
            Some(chart) => render_chart(&mut out, chart),
            None => {
                let _ = writeln!(out, "  {}", NO_CHART_DATA);
            }
        }
    }

    out.push('\n');
    render_table(&mut out, view);
    out
}

fn render_chart(out: &mut String, chart: &TimeSeriesChart) {
    for series in std::iter::once(&chart.left).chain(chart.right.as_ref()) {
        let [lo, hi] = series.bounds;
        let _ = writeln!(
            out,
            "  {:<14} {} [{}..{} {}]",
            series.name,
            sparkline(series, SPARK_WIDTH),
            lo,
            hi,
            series.unit
        );
    }
    let ticks = chart.sampled_ticks(2);
    if let [first, last] = ticks.as_slice() {
        let _ = writeln!(out, "  {:<14} {:<w$}{}", "", first, last, w = SPARK_WIDTH - last.len());
    }
}

/// One character per bucket; each bucket shows the mean of the values falling into it.
pub fn sparkline(series: &Series, width: usize) -> String {
    let values: Vec<f64> = series.points.iter().map(|p| p.1).collect();
    if values.is_empty() || width == 0 {
        return String::new();
    }
    let [lo, hi] = series.bounds;
    let span = (hi - lo).max(f64::EPSILON);
    let buckets = width.min(values.len());

    (0..buckets)
        .map(|b| {
            let start = b * values.len() / buckets;
            let end = ((b + 1) * values.len() / buckets).max(start + 1);
            let slice = &values[start..end];
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            let idx = (((mean - lo) / span) * (BARS.len() - 1) as f64).round();
            BARS[(idx.max(0.0) as usize).min(BARS.len() - 1)]
        })
        .collect()
}

fn render_table(out: &mut String, view: &DashboardView) {
    let widths = [26, 18, 14, 19, 20];
    let header = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| format!("{:<w$}", h, w = w))
        .collect::<String>();
    let _ = writeln!(out, "{}", header.trim_end());

    if view.is_empty() {
        let _ = writeln!(out, "{}", NO_TABLE_DATA);
        return;
    }
    for row in &view.rows {
        let line = row
            .cells()
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{:<w$}", c, w = w))
            .collect::<String>();
        let _ = writeln!(out, "{}", line.trim_end());
    }
}

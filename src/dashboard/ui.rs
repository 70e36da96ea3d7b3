//! Terminal rendering of the dashboard.

use chrono::TimeZone;
use ratatui::prelude::*;
use ratatui::symbols::Marker;
use ratatui::widgets::{Axis, Block, BorderType, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap};
use std::fmt::Display;

use super::app::{App, InputMode, Page};
use crate::models::reading::ConnectionStatus;
use crate::views::chart::{NO_DATA_MESSAGE as NO_CHART_DATA, TimeSeriesChart};
use crate::views::summary::StatCard;
use crate::views::table::{HEADERS, NO_DATA_MESSAGE as NO_TABLE_DATA};

const BORDER: BorderType = BorderType::Rounded;
const PRIMARY: Color = Color::Rgb(34, 211, 238);
const SUCCESS: Color = Color::Rgb(74, 222, 128);
const INFO: Color = Color::Rgb(96, 165, 250);
const DANGER: Color = Color::Rgb(248, 113, 113);
const MUTED: Color = Color::Rgb(100, 116, 139);
const TEMPERATURE: Color = Color::Rgb(136, 132, 216);
const HUMIDITY: Color = Color::Rgb(130, 202, 157);
const SOIL: Color = Color::Rgb(251, 191, 36);

pub fn draw<Tz>(frame: &mut Frame, app: &App<Tz>)
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    let banner = app.banner();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                                   // Header
            Constraint::Length(if banner.is_some() { 4 } else { 0 }), // Error banner
            Constraint::Min(5),                                      // Content
            Constraint::Length(1),                                   // Footer
        ])
        .split(frame.area());

    draw_header(frame, layout[0], app);
    if let Some(message) = banner {
        draw_banner(frame, layout[1], message);
    }

    match app.page() {
        Page::Readings => draw_readings(frame, layout[2], app),
        page => draw_placeholder(frame, layout[2], page),
    }

    draw_footer(frame, layout[3], app);
}

fn status_span(status: ConnectionStatus) -> Span<'static> {
    let color = match status {
        ConnectionStatus::Connected => SUCCESS,
        ConnectionStatus::Connecting => INFO,
        ConnectionStatus::Error => DANGER,
        ConnectionStatus::Disconnected => MUTED,
    };
    Span::styled(status.label(), Style::default().fg(color).add_modifier(Modifier::BOLD))
}

fn draw_header<Tz>(frame: &mut Frame, area: Rect, app: &App<Tz>)
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    let line = Line::from(vec![
        Span::styled(" SensorView ", Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        status_span(app.status),
        Span::styled(format!("  {}", app.source_description()), Style::default().fg(MUTED)),
        Span::styled(
            format!("  Range: {} ({} of {})", app.range().label(), app.filtered().len(), app.readings().len()),
            Style::default().fg(MUTED),
        ),
    ]);
    let block = Block::default().borders(Borders::ALL).border_type(BORDER);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_banner(frame: &mut Frame, area: Rect, message: &str) {
    let block = Block::default()
        .title(Span::styled(" Connection Error ", Style::default().fg(DANGER).add_modifier(Modifier::BOLD)))
        .title(Line::from(Span::styled(" x to dismiss ", Style::default().fg(MUTED))).right_aligned())
        .borders(Borders::ALL)
        .border_type(BORDER)
        .border_style(Style::default().fg(DANGER));
    let para = Paragraph::new(message.to_string())
        .style(Style::default().fg(DANGER))
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(para, area);
}

fn draw_placeholder(frame: &mut Frame, area: Rect, page: Page) {
    let (title, body) = match page {
        Page::Disconnected => (
            "Not Connected",
            "Press p to enter a project identifier or database URL.",
        ),
        Page::Fetching => ("Fetching Sensor Data...", "Attempting to connect to the sensor database."),
        Page::AwaitingData => (
            "Awaiting Data",
            "Successfully connected, but no data was found. Please ensure your device is sending data.",
        ),
        Page::Failed => (
            "Polling Stopped",
            "Press r to retry, p to choose another database, or x to dismiss and keep the last readings.",
        ),
        Page::Readings => ("", ""),
    };

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(title, Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(body, Style::default().fg(MUTED))),
    ];
    let para = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_type(BORDER));
    frame.render_widget(para, area);
}

fn draw_readings<Tz>(frame: &mut Frame, area: Rect, app: &App<Tz>)
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    let view = app.view();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),      // Stat cards
            Constraint::Percentage(55), // Charts
            Constraint::Min(4),         // Table
        ])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(layout[0]);
    for (card, rect) in view.summary.cards().into_iter().zip(cards.iter()) {
        frame.render_widget(stat_card(card), *rect);
    }

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(layout[1]);
    let cursor = app.cursor_index();
    draw_chart(frame, charts[0], "Temperature & Humidity", view.temp_humidity.as_ref(), cursor, [TEMPERATURE, HUMIDITY]);
    draw_chart(frame, charts[1], "Soil Moisture (%)", view.soil_moisture.as_ref(), cursor, [SOIL, SOIL]);

    draw_table(frame, layout[2], app);
}

fn stat_card(card: &StatCard) -> Paragraph<'static> {
    Paragraph::new(Line::from(Span::styled(
        card.display(),
        Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BORDER)
            .title(format!(" {} ", card.title)),
    )
}

fn draw_chart(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    chart: Option<&TimeSeriesChart>,
    cursor: Option<usize>,
    colors: [Color; 2],
) {
    let title = chart.map_or(title, |c| c.title);
    let block = Block::default()
        .title(Span::styled(format!(" {} ", title), Style::default().add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_type(BORDER);

    let Some(chart) = chart else {
        let msg = Paragraph::new(NO_CHART_DATA)
            .style(Style::default().fg(MUTED))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(msg, area);
        return;
    };

    let block = match &chart.right {
        Some(right) => {
            let [lo, _, hi] = right.axis_labels();
            block.title(
                Line::from(Span::styled(
                    format!(" {} {}..{} ", right.axis_title, lo, hi),
                    Style::default().fg(colors[1]),
                ))
                .right_aligned(),
            )
        }
        None => block,
    };
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(inner);

    let projected = chart.right.as_ref().map(|s| s.project_onto(chart.left.bounds));
    let selected: Vec<(f64, f64)> = cursor
        .and_then(|i| chart.left.points.get(i).copied())
        .into_iter()
        .collect();

    let mut datasets = vec![
        Dataset::default()
            .name(chart.left.name)
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(colors[0]))
            .data(&chart.left.points),
    ];
    if let (Some(right), Some(points)) = (chart.right.as_ref(), projected.as_ref()) {
        datasets.push(
            Dataset::default()
                .name(right.name)
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(colors[1]))
                .data(points),
        );
    }
    datasets.push(
        Dataset::default()
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::White))
            .data(&selected),
    );

    let max_ticks = (parts[0].width / 8).clamp(2, 8) as usize;
    let x_axis = Axis::default()
        .style(Style::default().fg(MUTED))
        .bounds(chart.x_bounds())
        .labels(chart.sampled_ticks(max_ticks));
    let y_axis = Axis::default()
        .title(Span::styled(chart.left.axis_title, Style::default().fg(colors[0])))
        .style(Style::default().fg(MUTED))
        .bounds(chart.left.bounds)
        .labels(chart.left.axis_labels());

    frame.render_widget(Chart::new(datasets).x_axis(x_axis).y_axis(y_axis), parts[0]);

    if let Some(tip) = cursor.and_then(|i| chart.tooltip(i)) {
        let mut spans = vec![Span::styled(tip.label, Style::default().fg(PRIMARY))];
        for line in tip.lines {
            spans.push(Span::styled(format!("  {}", line), Style::default().fg(MUTED)));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), parts[1]);
    }
}

fn draw_table<Tz>(frame: &mut Frame, area: Rect, app: &App<Tz>)
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    let rows = &app.view().rows;
    let block = Block::default()
        .title(Span::styled(
            format!(" All Sensor Readings ({}) ", rows.len()),
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BORDER);

    let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h)))
        .style(Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD));
    let widths = [
        Constraint::Length(26),
        Constraint::Length(17),
        Constraint::Length(13),
        Constraint::Length(18),
        Constraint::Length(20),
    ];

    let body: Vec<Row> = if rows.is_empty() {
        vec![Row::new(vec![Cell::from(NO_TABLE_DATA)]).style(Style::default().fg(MUTED))]
    } else {
        let visible = area.height.saturating_sub(3) as usize;
        rows.iter()
            .skip(app.table_offset)
            .take(visible.max(1))
            .map(|r| Row::new(r.cells().map(|c| Cell::from(c.to_string()))))
            .collect()
    };

    let table = Table::new(body, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn draw_footer<Tz>(frame: &mut Frame, area: Rect, app: &App<Tz>)
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    let line = match &app.mode {
        InputMode::EditingRange(text) => Line::from(vec![
            Span::styled(" Date range (YYYY-MM-DD[..YYYY-MM-DD], empty clears): ", Style::default().fg(PRIMARY)),
            Span::raw(format!("{}_", text)),
        ]),
        InputMode::EditingTarget(text) => Line::from(vec![
            Span::styled(" Project id or URL: ", Style::default().fg(PRIMARY)),
            Span::raw(format!("{}_", text)),
        ]),
        InputMode::Normal => match &app.notice {
            Some(notice) => Line::from(Span::styled(format!(" {}", notice), Style::default().fg(INFO))),
            None => {
                let export_style = if app.can_export() {
                    Style::default().fg(MUTED)
                } else {
                    Style::default().fg(MUTED).add_modifier(Modifier::DIM | Modifier::CROSSED_OUT)
                };
                Line::from(vec![
                    Span::styled(" q quit  d range  c clear  ", Style::default().fg(MUTED)),
                    Span::styled("e export", export_style),
                    Span::styled("  p database  r reconnect  ←/→ cursor  ↑/↓ scroll", Style::default().fg(MUTED)),
                ])
            }
        },
    };
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ReadingSource;
    use crate::dashboard::app::{DashboardSettings, SourceFactory};
    use crate::models::reading::{Target, decode_readings};
    use crate::services::poller::{PollEvent, PollEventKind};
    use chrono::Utc;
    use ratatui::backend::TestBackend;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;

    fn app() -> App<Utc> {
        let factory: SourceFactory =
            Box::new(|_: &Target| -> Result<Box<dyn ReadingSource>, String> { Err("offline".to_string()) });
        let settings = DashboardSettings {
            poll_interval: Duration::from_secs(60),
            export_dir: PathBuf::from("."),
            export_basename: "sensor_data".to_string(),
        };
        App::new(settings, factory, Utc)
    }

    fn render(app: &App<Utc>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 45)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buf = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                text.push_str(buf[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn with_readings(app: &mut App<Utc>, generation: u64) {
        let body = json!({
            "-a": {"datetime": "2024-01-01T10:00:00Z", "temperature": 21.23, "humidity": 50.0,
                   "soil_moisture_percent": 30.0, "soil_moisture_raw": 600},
            "-b": {"datetime": "2024-01-01T11:00:00Z", "temperature": 22.5, "humidity": 48.0,
                   "soil_moisture_percent": 29.5, "soil_moisture_raw": 605},
        })
        .to_string();
        let readings = decode_readings(&body, &Utc).unwrap();
        app.handle_poll_event(PollEvent {
            generation,
            kind: PollEventKind::Fetched(readings),
        });
    }

    #[test]
    fn disconnected_placeholder() {
        let text = render(&app());
        assert!(text.contains("SensorView"));
        assert!(text.contains("Disconnected"));
        assert!(text.contains("Press p to enter a project identifier"));
    }

    #[test]
    fn readings_page_shows_cards_charts_and_table() {
        let mut app = app();
        with_readings(&mut app, 0);
        let text = render(&app);
        assert!(text.contains("Connected"));
        assert!(text.contains("22.5°C"));
        assert!(text.contains("Temperature & Humidity"));
        assert!(text.contains("Soil Moisture (%)"));
        assert!(text.contains("All Sensor Readings (2)"));
        assert!(text.contains("Jan 1, 2024, 11:00:00 AM"));
        assert!(text.contains("21.23"));
    }

    #[test]
    fn error_banner_is_shown_until_dismissed() {
        let mut app = app();
        assert!(app.connect(Target::Project("garden".to_string())).is_err());
        let text = render(&app);
        assert!(text.contains("Connection Error"));
        assert!(text.contains("offline"));

        app.dismiss_error();
        let text = render(&app);
        assert!(!text.contains("Connection Error"));
    }

    #[test]
    fn editing_prompt_in_footer() {
        let mut app = app();
        app.mode = InputMode::EditingTarget("gard".to_string());
        let text = render(&app);
        assert!(text.contains("Project id or URL: gard_"));
    }
}

//! Dashboard controller state.
//!
//! Owns the raw reading list, connection status, error banner and date range for as long as the
//! dashboard runs. The filtered list and the [`DashboardView`] are derived and rebuilt whenever an
//! input changes.

use crate::client::{ReadingSource, SensorDbClient};
use crate::config::Config;
use crate::models::reading::{ConnectionStatus, SensorReading, Target};
use crate::services::export::{ExportError, export_csv};
use crate::services::fake_data::FakeSource;
use crate::services::filter::{DateRange, filter_readings};
use crate::services::poller::{self, PollEvent, PollEventKind, PollSession, PollerHandle};
use crate::views::DashboardView;
use chrono::{DateTime, Local, TimeZone};
use log::{info, warn};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Builds the reading source for a target.
pub type SourceFactory = Box<dyn Fn(&Target) -> Result<Box<dyn ReadingSource>, String>>;

/// Sources backed by the real database client, or synthetic data for [`Target::Demo`].
pub fn default_source_factory(cfg: &Config) -> SourceFactory {
    let template = cfg.url_template.clone();
    let timeout = cfg.request_timeout;
    let max_body_bytes = cfg.max_body_bytes;
    Box::new(move |target: &Target| -> Result<Box<dyn ReadingSource>, String> {
        match target.resolve_url(&template) {
            Some(url) => Ok(Box::new(SensorDbClient::new(url, timeout, max_body_bytes))),
            None => Ok(Box::new(FakeSource::with_history())),
        }
    })
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub poll_interval: Duration,
    pub export_dir: PathBuf,
    pub export_basename: String,
}

impl From<&Config> for DashboardSettings {
    fn from(cfg: &Config) -> Self {
        DashboardSettings {
            poll_interval: cfg.poll_interval,
            export_dir: cfg.export_dir.clone(),
            export_basename: cfg.export_basename.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditingRange(String),
    EditingTarget(String),
}

/// What the main area shows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Page {
    /// No target configured yet.
    Disconnected,
    /// First fetch for a target is running.
    Fetching,
    /// Connected, but the collection is empty.
    AwaitingData,
    /// Fetch failed; only the banner is shown.
    Failed,
    Readings,
}

pub struct App<Tz: TimeZone = Local> {
    settings: DashboardSettings,
    factory: SourceFactory,
    tz: Tz,

    pub status: ConnectionStatus,
    pub target: Option<Target>,
    readings: Vec<SensorReading>,
    range: DateRange,
    error: Option<String>,
    error_dismissed: bool,

    filtered: Vec<SensorReading>,
    view: DashboardView,

    generation: u64,
    poller: Option<PollerHandle>,
    event_tx: Sender<PollEvent>,
    event_rx: Receiver<PollEvent>,

    pub mode: InputMode,
    /// Selected chart point; `None` follows the newest reading.
    pub chart_cursor: Option<usize>,
    pub table_offset: usize,
    /// One-line feedback shown in the footer (export result, input errors).
    pub notice: Option<String>,
    should_quit: bool,
}

impl<Tz> App<Tz>
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    pub fn new(settings: DashboardSettings, factory: SourceFactory, tz: Tz) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let view = DashboardView::build(&[], &tz);
        App {
            settings,
            factory,
            tz,
            status: ConnectionStatus::Disconnected,
            target: None,
            readings: Vec::new(),
            range: DateRange::default(),
            error: None,
            error_dismissed: false,
            filtered: Vec::new(),
            view,
            generation: 0,
            poller: None,
            event_tx,
            event_rx,
            mode: InputMode::Normal,
            chart_cursor: None,
            table_offset: 0,
            notice: None,
            should_quit: false,
        }
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn filtered(&self) -> &[SensorReading] {
        &self.filtered
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Banner text while the error has not been dismissed.
    pub fn banner(&self) -> Option<&str> {
        if self.status == ConnectionStatus::Error && !self.error_dismissed {
            self.error.as_deref()
        } else {
            None
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error_dismissed = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn source_description(&self) -> String {
        self.target
            .as_ref()
            .map(Target::describe)
            .unwrap_or_else(|| "no database selected".to_string())
    }

    pub fn page(&self) -> Page {
        match self.status {
            ConnectionStatus::Disconnected => Page::Disconnected,
            ConnectionStatus::Error if !self.error_dismissed => Page::Failed,
            ConnectionStatus::Connecting if self.readings.is_empty() => Page::Fetching,
            ConnectionStatus::Connected if self.readings.is_empty() => Page::AwaitingData,
            _ => Page::Readings,
        }
    }

    /// Start polling `target` from a clean slate, replacing any running poller.
    pub fn connect(&mut self, target: Target) -> Result<(), String> {
        if let Some(mut old) = self.poller.take() {
            old.stop();
        }

        self.generation += 1;
        self.readings.clear();
        self.range = DateRange::default();
        self.error = None;
        self.error_dismissed = false;
        self.chart_cursor = None;
        self.table_offset = 0;
        self.status = ConnectionStatus::Connecting;
        self.target = Some(target.clone());
        self.refresh();

        let started = (self.factory)(&target).and_then(|source| {
            info!("Connecting to {} (generation {})", source.describe(), self.generation);
            let session = PollSession::new(source, self.tz.clone());
            poller::spawn(session, self.settings.poll_interval, self.generation, self.event_tx.clone())
        });
        match started {
            Ok(handle) => {
                self.poller = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.status = ConnectionStatus::Error;
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Re-activate the current target.
    pub fn reconnect(&mut self) -> Result<(), String> {
        match self.target.clone() {
            Some(target) => self.connect(target),
            None => Err("No database selected; press p to enter one".to_string()),
        }
    }

    /// Connect to user-typed input. Ignored while a connection is being established or when the
    /// input is blank.
    pub fn submit_target(&mut self, input: &str) -> Result<bool, String> {
        if self.status == ConnectionStatus::Connecting {
            return Ok(false);
        }
        let Some(target) = Target::from_input(input) else {
            return Ok(false);
        };
        self.connect(target)?;
        Ok(true)
    }

    pub fn set_range(&mut self, range: DateRange) {
        if self.range != range {
            self.range = range;
            self.chart_cursor = None;
            self.table_offset = 0;
            self.refresh();
        }
    }

    /// Apply every event queued by the poller.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_poll_event(event);
        }
    }

    pub fn handle_poll_event(&mut self, event: PollEvent) {
        if event.generation != self.generation {
            return;
        }
        match event.kind {
            PollEventKind::Attempt => {
                if self.status != ConnectionStatus::Error {
                    self.status = ConnectionStatus::Connecting;
                }
            }
            PollEventKind::Fetched(readings) => {
                self.readings = readings;
                self.status = ConnectionStatus::Connected;
                self.error = None;
                self.refresh();
            }
            PollEventKind::Failed(message) => {
                warn!("Connection error: {}", message);
                self.status = ConnectionStatus::Error;
                self.error = Some(message);
                self.error_dismissed = false;
                self.poller = None;
            }
        }
    }

    pub fn can_export(&self) -> bool {
        !self.filtered.is_empty()
    }

    /// Write the filtered readings to the export directory.
    pub fn export<ETz: TimeZone>(&mut self, now: &DateTime<ETz>) -> Result<Option<PathBuf>, ExportError>
    where
        ETz::Offset: Display,
    {
        let written = export_csv(
            &self.filtered,
            &self.settings.export_basename,
            &self.settings.export_dir,
            now,
        )?;
        self.notice = Some(match &written {
            Some(path) => format!("Exported {} reading(s) to {}", self.filtered.len(), path.display()),
            None => "No data to export".to_string(),
        });
        Ok(written)
    }

    /// Index of the chart point whose tooltip is shown.
    pub fn cursor_index(&self) -> Option<usize> {
        let last = self.filtered.len().checked_sub(1)?;
        Some(self.chart_cursor.map_or(last, |c| c.min(last)))
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let Some(current) = self.cursor_index() else {
            return;
        };
        let last = self.filtered.len() - 1;
        let next = current.saturating_add_signed(delta).min(last);
        self.chart_cursor = if next == last { None } else { Some(next) };
    }

    pub fn scroll_table(&mut self, delta: isize) {
        let max = self.view.rows.len().saturating_sub(1);
        self.table_offset = self.table_offset.saturating_add_signed(delta).min(max);
    }

    fn refresh(&mut self) {
        self.filtered = filter_readings(&self.readings, &self.range, &self.tz);
        self.view = DashboardView::build(&self.filtered, &self.tz);
        self.table_offset = self.table_offset.min(self.view.rows.len().saturating_sub(1));
    }
}

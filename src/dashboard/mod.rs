//! Interactive terminal dashboard.
//!
//! The main thread owns the [`App`] and redraws it every tick; the poller worker reports through a
//! channel that is drained between input events.

pub mod app;
pub mod input;
pub mod ui;

pub use app::App;

use std::io::{self, stdout};
use std::time::Duration;

use chrono::Local;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{info, warn};
use ratatui::prelude::*;

use crate::config::Config;
use app::{DashboardSettings, InputMode, default_source_factory};

const TICK: Duration = Duration::from_millis(100);

/// Enable raw mode and switch to the alternate screen.
pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout()))
}

pub fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

pub fn run(cfg: &Config) -> Result<(), String> {
    let mut app = App::new(DashboardSettings::from(cfg), default_source_factory(cfg), Local);

    if let Some(target) = cfg.target.clone() {
        // A failed start is shown in the banner.
        if let Err(e) = app.connect(target) {
            warn!("Initial connection failed: {}", e);
        }
    } else {
        info!("No database configured; waiting for input");
    }
    app.set_range(cfg.range);

    let mut terminal = setup_terminal().map_err(|e| format!("terminal setup failed: {}", e))?;
    let result = run_event_loop(&mut terminal, &mut app);
    restore_terminal().map_err(|e| format!("terminal restore failed: {}", e))?;

    info!("Dashboard closed");
    result
}

fn run_event_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<(), String> {
    while !app.should_quit() {
        terminal
            .draw(|f| ui::draw(f, app))
            .map_err(|e| format!("drawing failed: {}", e))?;

        if event::poll(TICK).map_err(|e| format!("reading input failed: {}", e))?
            && let Event::Key(key) = event::read().map_err(|e| format!("reading input failed: {}", e))?
            && key.kind == KeyEventKind::Press
        {
            let action = input::handle_key(key.code, app.mode != InputMode::Normal);
            input::apply_action(app, action);
        }

        app.drain_events();
    }
    Ok(())
}

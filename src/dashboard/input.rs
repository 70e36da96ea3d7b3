//! Keyboard input handling for the dashboard.
//!
//! | Key             | Action                           |
//! |-----------------|----------------------------------|
//! | `q` / `Esc`     | Quit                             |
//! | `d`             | Edit date range                  |
//! | `c`             | Clear date range                 |
//! | `e`             | Export filtered readings to CSV  |
//! | `p`             | Enter project id or URL          |
//! | `r`             | Reconnect to the current target  |
//! | `x`             | Dismiss the error banner         |
//! | `←` / `→`       | Move chart cursor                |
//! | `↑` / `↓`       | Scroll table by one row          |
//! | `PgUp` / `PgDn` | Scroll table by a page           |
//!
//! While editing, printable keys edit the text, `Enter` submits and `Esc` cancels.

use chrono::{Local, TimeZone};
use crossterm::event::KeyCode;
use log::warn;
use std::fmt::Display;

use super::app::{App, InputMode};
use crate::models::reading::ConnectionStatus;
use crate::services::filter::DateRange;

const PAGE_ROWS: isize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    EditRange,
    ClearRange,
    Export,
    EditTarget,
    Reconnect,
    DismissError,
    CursorLeft,
    CursorRight,
    ScrollUp(isize),
    ScrollDown(isize),
    TextInput(char),
    TextBackspace,
    TextSubmit,
    TextCancel,
    None,
}

pub fn handle_key(key: KeyCode, editing: bool) -> Action {
    if editing {
        return match key {
            KeyCode::Enter => Action::TextSubmit,
            KeyCode::Esc => Action::TextCancel,
            KeyCode::Backspace => Action::TextBackspace,
            KeyCode::Char(c) => Action::TextInput(c),
            _ => Action::None,
        };
    }

    match key {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('d') => Action::EditRange,
        KeyCode::Char('c') => Action::ClearRange,
        KeyCode::Char('e') => Action::Export,
        KeyCode::Char('p') => Action::EditTarget,
        KeyCode::Char('r') => Action::Reconnect,
        KeyCode::Char('x') => Action::DismissError,
        KeyCode::Left | KeyCode::Char('h') => Action::CursorLeft,
        KeyCode::Right | KeyCode::Char('l') => Action::CursorRight,
        KeyCode::Up | KeyCode::Char('k') => Action::ScrollUp(1),
        KeyCode::Down | KeyCode::Char('j') => Action::ScrollDown(1),
        KeyCode::PageUp => Action::ScrollUp(PAGE_ROWS),
        KeyCode::PageDown => Action::ScrollDown(PAGE_ROWS),
        _ => Action::None,
    }
}

pub fn apply_action<Tz>(app: &mut App<Tz>, action: Action)
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    match action {
        Action::Quit => app.quit(),
        Action::EditRange => {
            let current = match (app.range().from, app.range().to) {
                (Some(from), Some(to)) => format!("{}..{}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d")),
                (Some(from), None) => from.format("%Y-%m-%d").to_string(),
                _ => String::new(),
            };
            app.mode = InputMode::EditingRange(current);
        }
        Action::ClearRange => app.set_range(DateRange::default()),
        Action::Export => {
            if app.can_export()
                && let Err(e) = app.export(&Local::now())
            {
                warn!("Export failed: {}", e);
                app.notice = Some(format!("Export failed: {}", e));
            }
        }
        Action::EditTarget => {
            if app.status != ConnectionStatus::Connecting {
                app.mode = InputMode::EditingTarget(String::new());
            }
        }
        Action::Reconnect => {
            if let Err(e) = app.reconnect() {
                app.notice = Some(e);
            }
        }
        Action::DismissError => app.dismiss_error(),
        Action::CursorLeft => app.move_cursor(-1),
        Action::CursorRight => app.move_cursor(1),
        Action::ScrollUp(n) => app.scroll_table(-n),
        Action::ScrollDown(n) => app.scroll_table(n),
        Action::TextInput(c) => match &mut app.mode {
            InputMode::EditingRange(buf) | InputMode::EditingTarget(buf) => buf.push(c),
            InputMode::Normal => {}
        },
        Action::TextBackspace => match &mut app.mode {
            InputMode::EditingRange(buf) | InputMode::EditingTarget(buf) => {
                buf.pop();
            }
            InputMode::Normal => {}
        },
        Action::TextSubmit => submit(app),
        Action::TextCancel => app.mode = InputMode::Normal,
        Action::None => {}
    }
}

fn submit<Tz>(app: &mut App<Tz>)
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    match std::mem::replace(&mut app.mode, InputMode::Normal) {
        InputMode::EditingRange(text) => match DateRange::parse(&text) {
            Ok(range) => {
                app.set_range(range);
                app.notice = None;
            }
            Err(e) => {
                app.notice = Some(e);
                app.mode = InputMode::EditingRange(text);
            }
        },
        InputMode::EditingTarget(text) => match app.submit_target(&text) {
            Ok(true) => app.notice = None,
            // blank input keeps the prompt open
            Ok(false) => app.mode = InputMode::EditingTarget(text),
            Err(e) => app.notice = Some(e),
        },
        InputMode::Normal => {}
    }
}

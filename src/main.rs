pub mod models {
    pub mod reading;
}

pub mod client;
pub mod config;
pub mod dashboard;
pub mod utils;
pub mod services {
    pub mod export;
    pub mod fake_data;
    pub mod filter;
    pub mod poller;
}
pub mod views;

use crate::config::{CliOverrides, Config};
use crate::dashboard::app::default_source_factory;
use crate::models::reading::ConnectionStatus;
use crate::services::export::export_csv;
use crate::services::filter::filter_readings;
use crate::services::poller::{PollOutcome, PollSession};
use crate::views::DashboardView;
use crate::views::text::{SnapshotHeader, render};
use chrono::Local;
use clap::Parser;
use log::{error, info};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

pub fn run(cfg: &Config) -> Result<(), String> {
    info!(
        "Config loaded (target={}, poll_interval={}ms, request_timeout={}s, range={}, export_dir={})",
        cfg.target.as_ref().map(|t| t.describe()).unwrap_or_else(|| "-".to_string()),
        cfg.poll_interval.as_millis(),
        cfg.request_timeout.as_secs(),
        cfg.range.label(),
        cfg.export_dir.display()
    );

    if cfg.snapshot {
        run_snapshot(cfg)
    } else {
        dashboard::run(cfg)
    }
}

/// Fetch once, print the dashboard as text and optionally export the filtered readings.
fn run_snapshot(cfg: &Config) -> Result<(), String> {
    let target = cfg
        .target
        .clone()
        .ok_or_else(|| "`--snapshot` needs a database: set --project, --url or --demo".to_string())?;
    let source = default_source_factory(cfg)(&target)?;
    let source_label = source.describe();

    let mut session = PollSession::new(source, Local);
    session.begin();
    let (readings, error) = match session.poll() {
        PollOutcome::Readings(readings) => (readings, None),
        PollOutcome::Failed(message) => (Vec::new(), Some(message)),
    };
    let status = session.state().status();
    info!("Fetched {} reading(s) from {} ({})", readings.len(), source_label, status.label());

    let filtered = filter_readings(&readings, &cfg.range, &Local);
    let view = DashboardView::build(&filtered, &Local);
    let range_label = cfg.range.label();
    let header = SnapshotHeader {
        status,
        source: &source_label,
        range: &range_label,
        total: readings.len(),
        error: error.as_deref(),
    };
    print!("{}", render(&header, &view));

    if let Some(message) = error {
        return Err(message);
    }
    if cfg.export && status == ConnectionStatus::Connected {
        match export_csv(&filtered, &cfg.export_basename, &cfg.export_dir, &Local::now())
            .map_err(|e| format!("Export failed: {}", e))?
        {
            Some(path) => println!("\nExported {} reading(s) to {}", filtered.len(), path.display()),
            None => println!("\nNo data to export."),
        }
    }
    Ok(())
}

fn configure_env(cli: &CliOverrides) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = cli.env_file.clone() {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_env_file(&path)?;
        Ok(Some(LoadedEnvFile { path, explicit: true }))
    } else {
        let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
        let default_path = cwd.join(".env");
        if default_path.is_file() {
            load_env_file(&default_path)?;
            Ok(Some(LoadedEnvFile {
                path: default_path,
                explicit: false,
            }))
        } else {
            Ok(None)
        }
    }
}

/// The dashboard owns the terminal, so interactive runs log to a file.
fn init_logging(cfg: &Config) -> Result<(), String> {
    let default_filter = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(default_filter);
    builder.format_timestamp_secs();

    if !cfg.snapshot {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.log_file)
            .map_err(|e| format!("failed to open log file {}: {}", cfg.log_file.display(), e))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn startup(cli: &CliOverrides) -> Result<Config, String> {
    let loaded_env = configure_env(cli)?;

    let mut cfg = Config::from_env()?;
    cfg.apply_overrides(cli)?;

    // Init logging after environment so RUST_LOG from .env is respected.
    init_logging(&cfg)?;

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }
    Ok(cfg)
}

fn load_env_file(path: &Path) -> Result<(), String> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let file = File::open(path).map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
    let reader = BufReader::new(file);

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read {} at line {}: {}", path.display(), index + 1, e))?;
        match parse_env_assignment(&line) {
            Ok(Some((key, value))) => {
                // Preserve any value that was already supplied via the process environment.
                if std::env::var_os(&key).is_none() {
                    // Updating process-level environment variables is unsafe on some targets.
                    unsafe {
                        std::env::set_var(key, value);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                return Err(format!("{}:{}: {}", path.display(), index + 1, e));
            }
        }
    }

    Ok(())
}

fn parse_env_assignment(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let without_export = trimmed
        .strip_prefix("export ")
        .map(|s| s.trim_start())
        .unwrap_or(trimmed);

    let mut parts = without_export.splitn(2, '=');
    let key = parts
        .next()
        .map(str::trim)
        .ok_or_else(|| "missing environment variable name".to_string())?;
    let value_part = parts.next().ok_or_else(|| "missing '=' in assignment".to_string())?;

    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.chars().any(|c| c.is_whitespace()) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    let value = parse_env_value(value_part)?;
    Ok(Some((key.to_string(), value)))
}

fn parse_env_value(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    if let Some(rest) = trimmed.strip_prefix('"') {
        parse_double_quoted(rest)
    } else if let Some(rest) = trimmed.strip_prefix('\'') {
        parse_single_quoted(rest)
    } else {
        let value = trimmed.splitn(2, '#').next().unwrap_or_default().trim_end();
        Ok(value.to_string())
    }
}

fn parse_double_quoted(input: &str) -> Result<String, String> {
    let mut result = String::new();
    let mut chars = input.chars();
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if escape {
            let value = match ch {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '\\' => '\\',
                '"' => '"',
                other => other,
            };
            result.push(value);
            escape = false;
            continue;
        }

        match ch {
            '\\' => escape = true,
            '"' => {
                let remainder = chars.as_str().trim();
                if remainder.is_empty() || remainder.starts_with('#') {
                    return Ok(result);
                } else {
                    return Err("unexpected characters after closing double quote".to_string());
                }
            }
            other => result.push(other),
        }
    }

    if escape {
        Err("unterminated escape sequence in double-quoted value".to_string())
    } else {
        Err("unterminated double-quoted value".to_string())
    }
}

fn parse_single_quoted(input: &str) -> Result<String, String> {
    let mut result = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch == '\'' {
            let remainder = chars.as_str().trim();
            if remainder.is_empty() || remainder.starts_with('#') {
                return Ok(result);
            } else {
                return Err("unexpected characters after closing single quote".to_string());
            }
        } else {
            result.push(ch);
        }
    }

    Err("unterminated single-quoted value".to_string())
}

fn main() {
    let cli = CliOverrides::parse();
    let cfg = match startup(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    info!(
        "sensorview {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(&cfg) {
        error!("fatal: {}", e);
        if !cfg.snapshot {
            eprintln!("fatal: {}", e);
        }
        std::process::exit(1);
    }
}

//! Minimal runtime configuration helpers.
//! Every value can come from the environment (optionally seeded from a `.env` file) and most can
//! be overridden on the command line.

use crate::client::DEFAULT_MAX_BODY_BYTES;
use crate::models::reading::Target;
use crate::services::export::DEFAULT_BASENAME;
use crate::services::filter::DateRange;
use crate::services::poller::DEFAULT_POLL_INTERVAL;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_URL_TEMPLATE: &str = "https://{project}-default-rtdb.firebaseio.com/sensors.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_FILE: &str = "sensorview.log";

#[derive(Debug, Clone)]
pub struct Config {
    /// Initial target; `None` starts disconnected until one is entered.
    pub target: Option<Target>,
    /// Collection URL with a `{project}` placeholder, used for project identifiers.
    pub url_template: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Upper bound on a collection body; defaults to unlimited.
    pub max_body_bytes: u64,
    pub export_dir: PathBuf,
    pub export_basename: String,
    /// Interactive mode writes logs here instead of the terminal.
    pub log_file: PathBuf,
    pub range: DateRange,
    /// Fetch once, print and exit.
    pub snapshot: bool,
    /// With `snapshot`, also write the CSV.
    pub export: bool,
}

/// Command-line overrides; `None` keeps the environment value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Parser)]
#[command(name = "sensorview", version, about = "Terminal dashboard for remote sensor readings")]
pub struct CliOverrides {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Full collection URL (overrides SENSORVIEW_URL)
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    pub url: Option<String>,

    /// Project identifier substituted into the URL template (overrides SENSORVIEW_PROJECT)
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    pub project: Option<String>,

    /// First day of the date range (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,

    /// Last day of the date range (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "from")]
    pub to: Option<String>,

    /// Use synthetic readings instead of a database
    #[arg(long)]
    pub demo: bool,

    /// Fetch once, print the dashboard as text and exit
    #[arg(long)]
    pub snapshot: bool,

    /// With --snapshot, also write the CSV export
    #[arg(long, requires = "snapshot")]
    pub export: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let target = match (non_empty("SENSORVIEW_URL"), non_empty("SENSORVIEW_PROJECT")) {
            (Some(url), _) => Some(Target::Url(url)),
            (None, Some(project)) => Some(Target::Project(project)),
            (None, None) => None,
        };

        let url_template = non_empty("SENSORVIEW_URL_TEMPLATE").unwrap_or_else(|| DEFAULT_URL_TEMPLATE.to_string());
        if !url_template.contains(crate::models::reading::PROJECT_PLACEHOLDER) {
            return Err("SENSORVIEW_URL_TEMPLATE must contain `{project}`".to_string());
        }

        let poll_interval = match non_empty("POLL_INTERVAL_MS") {
            Some(s) => match s.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err("POLL_INTERVAL_MS must be a positive integer".to_string()),
            },
            None => DEFAULT_POLL_INTERVAL,
        };

        let request_timeout_secs = non_empty("REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let max_body_bytes = match non_empty("MAX_BODY_BYTES") {
            Some(s) => match s.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => return Err("MAX_BODY_BYTES must be a positive integer".to_string()),
            },
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Config {
            target,
            url_template,
            poll_interval,
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_body_bytes,
            export_dir: non_empty("EXPORT_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            export_basename: non_empty("EXPORT_BASENAME").unwrap_or_else(|| DEFAULT_BASENAME.to_string()),
            log_file: non_empty("SENSORVIEW_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            range: DateRange::default(),
            snapshot: false,
            export: false,
        })
    }

    pub fn apply_overrides(&mut self, cli: &CliOverrides) -> Result<(), String> {
        if cli.demo {
            self.target = Some(Target::Demo);
        } else if let Some(url) = cli.url.as_deref() {
            self.target = Some(Target::from_input(url).ok_or("`--url` requires a value")?);
        } else if let Some(project) = cli.project.as_deref() {
            let project = project.trim();
            if project.is_empty() {
                return Err("`--project` requires a value".to_string());
            }
            self.target = Some(Target::Project(project.to_string()));
        }

        let text = match (cli.from.as_deref(), cli.to.as_deref()) {
            (Some(from), Some(to)) => format!("{}..{}", from, to),
            (Some(from), None) => from.to_string(),
            (None, Some(_)) => return Err("`--to` requires `--from`".to_string()),
            (None, None) => String::new(),
        };
        self.range = DateRange::parse(&text)?;

        if cli.export && !cli.snapshot {
            return Err("`--export` is only valid together with `--snapshot`".to_string());
        }
        self.snapshot = cli.snapshot;
        self.export = cli.export;
        Ok(())
    }
}

//! Blocking HTTP client for the realtime database REST endpoint.
//!
//! - Uses `ureq` (no async); one request per poll.
//! - Only reads: a `GET` of the whole collection path (`.../sensors.json`).
//! - No auth; the collection must allow public reads.

use std::time::Duration;

#[derive(Debug)]
pub enum ClientError {
    Transport(String),
    Http { status: u16, message: String },
    Body(String),
}

impl core::fmt::Display for ClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ClientError::Transport(s) => write!(f, "transport error: {}", s),
            ClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            ClientError::Body(s) => write!(f, "failed to read response body: {}", s),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Anything that can hand the poller a raw collection body.
pub trait ReadingSource: Send {
    fn fetch(&mut self) -> Result<String, ClientError>;

    /// Short human-readable origin for logs and the header bar.
    fn describe(&self) -> String;
}

/// No cap on the collection size: every poll reads the whole collection.
pub const DEFAULT_MAX_BODY_BYTES: u64 = u64::MAX;

pub struct SensorDbClient {
    agent: ureq::Agent,
    url: String,
    max_body_bytes: u64,
}

impl SensorDbClient {
    pub fn new(url: impl Into<String>, timeout: Duration, max_body_bytes: u64) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        SensorDbClient {
            agent,
            url: url.into(),
            max_body_bytes,
        }
    }

    /// GET the collection and return the body of a 2xx response.
    pub fn get_collection(&self) -> Result<String, ClientError> {
        let mut res = self
            .agent
            .get(self.url.as_str())
            .header("Accept", "application/json")
            .call()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res
                .body_mut()
                .read_to_string()
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        // ureq caps bodies at 10 MiB unless told otherwise
        res.body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_string()
            .map_err(|e| ClientError::Body(e.to_string()))
    }
}

impl ReadingSource for SensorDbClient {
    fn fetch(&mut self) -> Result<String, ClientError> {
        self.get_collection()
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Text shown in the error banner.
pub fn banner_message(err: &ClientError) -> String {
    match err {
        ClientError::Http { status, .. } => {
            let reason = http::StatusCode::from_u16(*status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(|r| format!(" {}", r))
                .unwrap_or_default();
            format!(
                "Failed to fetch data (Status: {}{}). Ensure the database URL is correct and public read access is allowed.",
                status, reason
            )
        }
        ClientError::Transport(s) => format!("Could not reach the sensor database: {}", s),
        ClientError::Body(s) => format!("The sensor database response could not be read: {}", s),
    }
}

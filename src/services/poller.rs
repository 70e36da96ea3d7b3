//! Periodic collection polling.
//!
//! A [`PollSession`] performs single fetch attempts and tracks the poller state machine:
//!
//! ```text
//! Idle -> Connecting -> Connected -> Connecting -> ...
//!              \             \
//!               `-> Failed    `-> Failed (terminal)
//! ```
//!
//! [`spawn`] runs a session on a worker thread at a steady cadence and reports every transition as
//! a [`PollEvent`]. The first failure ends the worker; a new activation is needed to poll again.

use crate::client::{ReadingSource, banner_message};
use crate::models::reading::{ConnectionStatus, SensorReading, decode_readings};
use chrono::TimeZone;
use log::{debug, info, warn};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

const UNREADABLE_RESPONSE: &str =
    "The sensor database returned data that could not be parsed. Check that the URL points at the readings collection.";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Connecting,
    Connected,
    Failed,
}

impl PollerState {
    pub fn status(self) -> ConnectionStatus {
        match self {
            PollerState::Idle => ConnectionStatus::Disconnected,
            PollerState::Connecting => ConnectionStatus::Connecting,
            PollerState::Connected => ConnectionStatus::Connected,
            PollerState::Failed => ConnectionStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Readings(Vec<SensorReading>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEventKind {
    /// A fetch is about to be issued.
    Attempt,
    Fetched(Vec<SensorReading>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollEvent {
    /// Activation the event belongs to.
    pub generation: u64,
    pub kind: PollEventKind,
}

pub struct PollSession<Tz: TimeZone> {
    source: Box<dyn ReadingSource>,
    tz: Tz,
    state: PollerState,
    attempts: u64,
}

impl<Tz: TimeZone> PollSession<Tz> {
    pub fn new(source: Box<dyn ReadingSource>, tz: Tz) -> Self {
        PollSession {
            source,
            tz,
            state: PollerState::Idle,
            attempts: 0,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Begin an attempt. A failed session stays failed.
    pub fn begin(&mut self) -> bool {
        if self.state == PollerState::Failed {
            return false;
        }
        self.state = PollerState::Connecting;
        true
    }

    /// Fetch and decode once. Call [`begin`](Self::begin) first.
    pub fn poll(&mut self) -> PollOutcome {
        self.attempts += 1;
        let outcome = match self.source.fetch() {
            Ok(body) => match decode_readings(&body, &self.tz) {
                Ok(readings) => PollOutcome::Readings(readings),
                Err(e) => {
                    warn!("Decoding response from {} failed: {}", self.source.describe(), e);
                    PollOutcome::Failed(UNREADABLE_RESPONSE.to_string())
                }
            },
            Err(e) => {
                warn!("Fetching {} failed: {}", self.source.describe(), e);
                PollOutcome::Failed(banner_message(&e))
            }
        };

        self.state = match outcome {
            PollOutcome::Readings(_) => PollerState::Connected,
            PollOutcome::Failed(_) => PollerState::Failed,
        };
        outcome
    }
}

/// Handle to a running worker. Dropping it stops the schedule; a request already in flight is
/// allowed to finish but its result is discarded by generation.
pub struct PollerHandle {
    generation: u64,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn stop(&mut self) {
        if self.stop_tx.take().is_some() {
            debug!("Poller generation {} stop requested", self.generation);
        }
    }

    /// Wait for the worker to exit without stopping it.
    pub fn join(mut self) {
        if let Some(t) = self.thread.take()
            && t.join().is_err()
        {
            warn!("Poller generation {} panicked", self.generation);
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run `session` on a worker thread, fetching immediately and then every `interval`.
pub fn spawn<Tz>(
    session: PollSession<Tz>,
    interval: Duration,
    generation: u64,
    events: Sender<PollEvent>,
) -> Result<PollerHandle, String>
where
    Tz: TimeZone + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let thread = thread::Builder::new()
        .name(format!("poller-{}", generation))
        .spawn(move || run_loop(session, interval, generation, &events, &stop_rx))
        .map_err(|e| format!("failed to start poller thread: {}", e))?;

    Ok(PollerHandle {
        generation,
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    })
}

fn run_loop<Tz: TimeZone>(
    mut session: PollSession<Tz>,
    interval: Duration,
    generation: u64,
    events: &Sender<PollEvent>,
    stop_rx: &Receiver<()>,
) {
    info!(
        "Polling {} every {}ms (generation {})",
        session.describe(),
        interval.as_millis(),
        generation
    );

    let send = |kind: PollEventKind| events.send(PollEvent { generation, kind }).is_ok();

    loop {
        let tick_start = Instant::now();

        if !session.begin() || !send(PollEventKind::Attempt) {
            break;
        }

        let failed = match session.poll() {
            PollOutcome::Readings(readings) => {
                debug!("Fetched {} reading(s)", readings.len());
                !send(PollEventKind::Fetched(readings))
            }
            PollOutcome::Failed(message) => {
                send(PollEventKind::Failed(message));
                info!("Polling stopped after failure (generation {})", generation);
                true
            }
        };
        if failed {
            break;
        }

        // Maintain steady cadence
        let wait = interval.saturating_sub(tick_start.elapsed());
        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(
        "Poller generation {} exiting after {} attempt(s) in state {:?}",
        generation,
        session.attempts(),
        session.state()
    );
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedSource;
    use super::*;
    use crate::client::ClientError;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn body() -> String {
        json!({
            "-late": {"datetime": "2024-01-02T10:00:00Z", "temperature": 20.0, "humidity": 50.0,
                      "soil_moisture_percent": 40.0, "soil_moisture_raw": 700},
            "-early": {"datetime": "2024-01-01T10:00:00Z", "temperature": 21.23, "humidity": 51.0,
                       "soil_moisture_percent": 41.0, "soil_moisture_raw": 690},
        })
        .to_string()
    }

    #[test]
    fn session_success_sorts_and_connects() {
        let src = ScriptedSource::new(vec![Ok(body())]);
        let mut session = PollSession::new(Box::new(src), Utc);
        assert_eq!(session.state(), PollerState::Idle);
        assert!(session.begin());
        assert_eq!(session.state(), PollerState::Connecting);

        let PollOutcome::Readings(readings) = session.poll() else {
            panic!("expected readings");
        };
        assert_eq!(session.state(), PollerState::Connected);
        let ids: Vec<_> = readings.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["-early", "-late"]);
    }

    #[test]
    fn null_body_connects_with_no_readings() {
        let src = ScriptedSource::new(vec![Ok("null".to_string())]);
        let mut session = PollSession::new(Box::new(src), Utc);
        session.begin();
        assert_eq!(session.poll(), PollOutcome::Readings(Vec::new()));
        assert_eq!(session.state().status(), ConnectionStatus::Connected);
    }

    #[test]
    fn malformed_body_fails_and_stays_failed() {
        let src = ScriptedSource::new(vec![Ok("<html>".to_string())]);
        let mut session = PollSession::new(Box::new(src), Utc);
        session.begin();
        assert!(matches!(session.poll(), PollOutcome::Failed(_)));
        assert_eq!(session.state(), PollerState::Failed);
        assert!(!session.begin());
        assert_eq!(session.state(), PollerState::Failed);
    }

    #[test]
    fn worker_stops_after_http_error() {
        let src = ScriptedSource::new(vec![Err(ClientError::Http {
            status: 404,
            message: "not found".to_string(),
        })]);
        let calls = src.calls.clone();
        let (tx, rx) = mpsc::channel();
        let handle = spawn(PollSession::new(Box::new(src), Utc), Duration::from_millis(5), 3, tx).unwrap();
        handle.join();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, PollEventKind::Attempt);
        assert!(events.iter().all(|e| e.generation == 3));
        match &events[1].kind {
            PollEventKind::Failed(msg) => assert!(msg.contains("404")),
            other => panic!("unexpected event {:?}", other),
        }

        // no further ticks after the failure
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn worker_polls_repeatedly_until_stopped() {
        let src = ScriptedSource::new(vec![Ok(body())]);
        let calls = src.calls.clone();
        let (tx, rx) = mpsc::channel();
        let mut handle = spawn(PollSession::new(Box::new(src), Utc), Duration::from_millis(5), 1, tx).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut fetched = 0;
        while fetched < 3 && Instant::now() < deadline {
            if let Ok(ev) = rx.recv_timeout(Duration::from_millis(100))
                && matches!(ev.kind, PollEventKind::Fetched(_))
            {
                fetched += 1;
            }
        }
        assert_eq!(fetched, 3);

        handle.stop();
        handle.join();
        let after_stop = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn worker_exits_when_receiver_is_gone() {
        let src = ScriptedSource::new(vec![Ok(body())]);
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let handle = spawn(PollSession::new(Box::new(src), Utc), Duration::from_millis(5), 1, tx).unwrap();
        handle.join();
    }
}

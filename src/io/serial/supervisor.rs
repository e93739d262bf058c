// src/io/serial/supervisor.rs
//
// Single-session controller driven by the shell.
// At most one session runs at a time. `start` returns as soon as the read
// loop is spawned; `stop` blocks until it has exited.

use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::log_sink::{resolve_log_path, LogSink, LogSinkError};
use super::port::{PortOpener, SystemPorts};
use super::session::{EventSender, SerialSession, SessionConfig, SessionEvent, SessionEvents};
use crate::io::SessionState;

/// Poll interval used when the read delay field is left empty (1 ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("A serial session is already running")]
    AlreadyRunning,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    PortOpenFailed(String),
    #[error(transparent)]
    LogOpenFailed(#[from] LogSinkError),
    #[error("Failed to spawn read loop: {0}")]
    TaskSpawnFailed(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendError {
    #[error("No serial session is running")]
    NotRunning,
    #[error("{0}")]
    WriteFailed(String),
}

// ============================================================================
// Start Requests
// ============================================================================

/// Session parameters as entered by the user, before validation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionRequest {
    pub port: String,
    pub baud_rate: String,
    pub log_path: String,
    /// Seconds between polls; fractional values allowed, empty means the default
    pub read_delay: String,
    pub show_timestamp: bool,
}

impl SessionRequest {
    /// Validate and convert into a `SessionConfig`.
    pub fn parse(&self) -> Result<SessionConfig, StartError> {
        let port = self.port.trim();
        if port.is_empty() {
            return Err(StartError::InvalidConfig("No serial port selected".to_string()));
        }
        let log_path = self.log_path.trim();
        if log_path.is_empty() {
            return Err(StartError::InvalidConfig("No log path specified".to_string()));
        }

        let baud_rate = self
            .baud_rate
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|b| *b > 0)
            .ok_or_else(|| {
                StartError::InvalidConfig(format!("Invalid baud rate: {:?}", self.baud_rate))
            })?;

        let poll_interval = parse_read_delay(&self.read_delay).ok_or_else(|| {
            StartError::InvalidConfig(format!("Invalid read delay: {:?}", self.read_delay))
        })?;

        Ok(SessionConfig {
            port: port.to_string(),
            baud_rate,
            log_path_template: log_path.to_string(),
            poll_interval,
            show_timestamp: self.show_timestamp,
        })
    }
}

/// Parse a read delay in seconds. Empty input yields the default.
pub fn parse_read_delay(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return Some(DEFAULT_POLL_INTERVAL);
    }
    let secs = value.parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

// ============================================================================
// Supervisor
// ============================================================================

pub struct SessionSupervisor {
    opener: Box<dyn PortOpener>,
    session: Option<SerialSession>,
    events: EventSender,
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionSupervisor {
    /// Create a supervisor and the receiving end of its event channel.
    pub fn new(opener: impl PortOpener + 'static) -> (Self, SessionEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Idle);
        let supervisor = Self {
            opener: Box::new(opener),
            session: None,
            events,
            state: Arc::new(state),
        };
        (supervisor, rx)
    }

    /// Supervisor over the local machine's serial devices.
    pub fn with_system_ports() -> (Self, SessionEvents) {
        Self::new(SystemPorts)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions (for enabling and disabling controls).
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().map_or(false, |s| !s.is_finished())
    }

    /// Log file of the current session, if any.
    pub fn log_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.log_path())
    }

    /// Validate `request` and start a session.
    pub fn start(&mut self, request: &SessionRequest) -> Result<(), StartError> {
        self.reap_finished();
        if self.session.is_some() {
            return Err(StartError::AlreadyRunning);
        }
        let config = request.parse()?;
        self.start_config(config)
    }

    /// Start a session from an already parsed config.
    pub fn start_config(&mut self, config: SessionConfig) -> Result<(), StartError> {
        self.reap_finished();
        if self.session.is_some() {
            return Err(StartError::AlreadyRunning);
        }
        if config.port.is_empty() || config.log_path_template.is_empty() || config.baud_rate == 0 {
            return Err(StartError::InvalidConfig(
                "Port, baud rate and log path are required".to_string(),
            ));
        }

        self.state.send_replace(SessionState::Opening);
        match self.open_session(config) {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                tlog!("[Supervisor] Start failed: {}", e);
                self.state.send_replace(SessionState::Idle);
                Err(e)
            }
        }
    }

    fn open_session(&mut self, config: SessionConfig) -> Result<SerialSession, StartError> {
        let link = self
            .opener
            .open(&config.port, config.baud_rate)
            .map_err(StartError::PortOpenFailed)?;

        // On failure the port is dropped here, so it never outlives a missing log
        let log_path = resolve_log_path(&config.log_path_template, &config.port, &Local::now());
        let log = LogSink::open(&log_path)?;

        tlog!(
            "[Supervisor] Opened {} at {} baud, logging to {}",
            config.port,
            config.baud_rate,
            log_path.display()
        );
        let _ = self.events.send(SessionEvent::Opened {
            port: config.port.clone(),
            baud_rate: config.baud_rate,
            log_path: log_path.clone(),
        });

        // Running is published before the loop starts so a fast exit can
        // only ever move the state on to Idle
        self.state.send_replace(SessionState::Running);
        SerialSession::spawn(config, link, log, self.events.clone(), self.state.clone())
    }

    /// Stop the current session and wait for its read loop to exit.
    /// Does nothing when no session exists.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let port = session.config().port.clone();
        self.state.send_replace(SessionState::Stopping);
        let reason = session.close();
        self.state.send_replace(SessionState::Idle);
        tlog!("[Supervisor] Session on {} stopped ({:?})", port, reason);
    }

    /// Write `message` to the port as UTF-8.
    pub fn send(&self, message: &str) -> Result<(), SendError> {
        let session = match self.session.as_ref() {
            Some(s) if !s.is_finished() => s,
            _ => return Err(SendError::NotRunning),
        };

        match session.write(message.as_bytes()) {
            Ok(()) => {
                let _ = self.events.send(SessionEvent::Sent(message.to_string()));
                Ok(())
            }
            Err(e) => {
                tlog!("[Supervisor] Send on {} failed: {}", session.config().port, e);
                Err(e)
            }
        }
    }

    /// Drop a session whose read loop has already ended on its own.
    fn reap_finished(&mut self) {
        if self.session.as_ref().map_or(false, |s| s.is_finished()) {
            if let Some(session) = self.session.take() {
                let reason = session.close();
                tlog!(
                    "[Supervisor] Reaped ended session ({:?})",
                    reason
                );
            }
            self.state.send_replace(SessionState::Idle);
        }
    }
}

impl Drop for SessionSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

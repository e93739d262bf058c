// src/io/serial/session.rs
//
// One open serial port plus its capture log, and the background read loop
// that drains the port into both sinks.
//
// The port lives behind a session-scoped mutex so the read loop, `write` and
// `close` never touch the device at the same time. Closing takes the port out
// of its slot; the loop sees the empty slot on its next poll and exits.

use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::annotate::annotate;
use super::decode::decode_bytes;
use super::log_sink::{LogSink, LogSinkError};
use super::port::SerialLink;
use super::supervisor::{SendError, StartError};
use crate::io::SessionState;

// ============================================================================
// Types
// ============================================================================

/// Validated session parameters, fixed for the lifetime of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Log path template with `{PORT}` and `{TIME}` placeholders
    pub log_path_template: String,
    /// Wait between polls when no input was waiting. Lower values cut
    /// display latency at the cost of more wakeups.
    pub poll_interval: Duration,
    pub show_timestamp: bool,
}

/// Why a read loop finished.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum EndReason {
    /// The port was closed by `stop`
    Stopped,
    /// The device reported itself closed
    Disconnected,
    ReadError(String),
    LogWriteFailed(String),
}

/// Messages from a session to the foreground. The foreground is the only
/// consumer and is responsible for feeding the display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Opened {
        port: String,
        baud_rate: u32,
        log_path: PathBuf,
    },
    /// Annotated text ready for the display
    Received(String),
    /// A message was written to the port
    Sent(String),
    Ended(EndReason),
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

pub(crate) type SharedPort = Arc<Mutex<Option<Box<dyn SerialLink>>>>;

// ============================================================================
// Session
// ============================================================================

/// A running session. Owns the port slot and the read loop thread; the
/// capture log is owned by the loop and closed when it exits.
pub struct SerialSession {
    config: SessionConfig,
    log_path: PathBuf,
    port: SharedPort,
    task: Option<JoinHandle<EndReason>>,
}

impl SerialSession {
    /// Spawn the read loop over an already opened port and log.
    pub(crate) fn spawn(
        config: SessionConfig,
        link: Box<dyn SerialLink>,
        log: LogSink,
        events: EventSender,
        state: Arc<watch::Sender<SessionState>>,
    ) -> Result<Self, StartError> {
        let log_path = log.path().to_path_buf();
        let port: SharedPort = Arc::new(Mutex::new(Some(link)));

        let ctx = ReadLoop {
            tag: config.port.clone(),
            poll_interval: config.poll_interval,
            show_timestamp: config.show_timestamp,
            port: port.clone(),
            log,
            events,
            state,
        };

        let task = std::thread::Builder::new()
            .name(format!("serial-read-{}", config.port))
            .spawn(move || ctx.run())
            .map_err(|e| StartError::TaskSpawnFailed(e.to_string()))?;

        Ok(Self {
            config,
            log_path,
            port,
            task: Some(task),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// True once the read loop has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Write bytes straight to the port. A failure leaves the session running.
    pub fn write(&self, data: &[u8]) -> Result<(), SendError> {
        let mut guard = self
            .port
            .lock()
            .map_err(|e| SendError::WriteFailed(format!("Port mutex poisoned: {}", e)))?;
        let link = guard.as_mut().ok_or(SendError::NotRunning)?;
        link.write_bytes(data)
            .map_err(|e| SendError::WriteFailed(format!("Serial write error: {}", e)))
    }

    /// Close the port, then wait for the read loop to exit.
    pub fn close(mut self) -> Option<EndReason> {
        close_port(&self.port);
        let task = self.task.take()?;
        match task.join() {
            Ok(reason) => Some(reason),
            Err(e) => {
                tlog!("[Serial:{}] Read loop panicked: {:?}", self.config.port, e);
                None
            }
        }
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            close_port(&self.port);
            let _ = task.join();
        }
    }
}

/// Drop the port out of its slot, which closes the device.
fn close_port(port: &SharedPort) {
    let mut guard = port.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.take();
}

// ============================================================================
// Read Loop
// ============================================================================

enum PollStep {
    Chunk(usize),
    Idle,
    Closed(EndReason),
    Failed(String),
}

struct ReadLoop {
    tag: String,
    poll_interval: Duration,
    show_timestamp: bool,
    port: SharedPort,
    log: LogSink,
    events: EventSender,
    state: Arc<watch::Sender<SessionState>>,
}

impl ReadLoop {
    fn run(mut self) -> EndReason {
        tlog!(
            "[Serial:{}] Read loop started (poll: {:?}, timestamps: {}, log: {})",
            self.tag,
            self.poll_interval,
            self.show_timestamp,
            self.log.path().display()
        );

        let mut buf: Vec<u8> = Vec::with_capacity(256);
        let reason = loop {
            let step = match self.port.lock() {
                Ok(mut guard) => poll_once(&mut guard, &mut buf),
                Err(e) => PollStep::Failed(format!("Port mutex poisoned: {}", e)),
            };

            match step {
                PollStep::Chunk(n) => {
                    if let Err(e) = self.deliver(&buf[..n]) {
                        tlog!("[Serial:{}] {}", self.tag, e);
                        break EndReason::LogWriteFailed(e.to_string());
                    }
                }
                PollStep::Idle => std::thread::sleep(self.poll_interval),
                PollStep::Closed(reason) => break reason,
                PollStep::Failed(msg) => {
                    tlog!("[Serial:{}] {}", self.tag, msg);
                    break EndReason::ReadError(msg);
                }
            }
        };

        // Port and log close together
        close_port(&self.port);
        let ReadLoop { tag, log, events, state, .. } = self;
        drop(log);

        tlog!("[Serial:{}] Read loop ended (reason: {:?})", tag, reason);
        state.send_replace(SessionState::Idle);
        let _ = events.send(SessionEvent::Ended(reason.clone()));
        reason
    }

    /// Decode, annotate and fan one chunk out to the display and the log.
    fn deliver(&mut self, data: &[u8]) -> Result<(), LogSinkError> {
        let text = decode_bytes(data);
        let stamp = self.show_timestamp.then(Local::now);
        let annotated = annotate(&text, stamp.as_ref());

        // A closed receiver only means nobody is watching; keep logging
        let _ = self.events.send(SessionEvent::Received(annotated.display));
        self.log.append(&annotated.log)
    }
}

/// Check the port once and read whatever is waiting into `buf`.
fn poll_once(slot: &mut Option<Box<dyn SerialLink>>, buf: &mut Vec<u8>) -> PollStep {
    let Some(link) = slot.as_mut() else {
        return PollStep::Closed(EndReason::Stopped);
    };
    if !link.is_open() {
        return PollStep::Closed(EndReason::Disconnected);
    }

    let available = match link.bytes_available() {
        Ok(0) => return PollStep::Idle,
        Ok(n) => n,
        Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => return PollStep::Idle,
        Err(e) => return PollStep::Failed(format!("Read error: {}", e)),
    };

    buf.resize(available, 0);
    match link.read_bytes(&mut buf[..available]) {
        Ok(0) => PollStep::Idle,
        Ok(n) => PollStep::Chunk(n),
        Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => PollStep::Idle,
        Err(e) => PollStep::Failed(format!("Read error: {}", e)),
    }
}

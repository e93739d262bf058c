// src/lib.rs
//
// Live serial-port terminal.
// Opens a serial port, streams decoded device output to a display and a
// capture log, and writes user messages back to the device.

#[macro_use]
mod logging;

pub mod display;
pub mod io;
pub mod settings;

#[cfg(feature = "cli")]
pub mod cli;

pub use display::{drain_events, show_event, DisplaySink, WriterSink};
pub use io::{
    EndReason, SendError, SessionConfig, SessionEvent, SessionEvents, SessionRequest,
    SessionState, SessionSupervisor, StartError,
};
pub use logging::{init_file_logging, stop_file_logging};
pub use settings::{AppSettings, SettingsError, SettingsStore};

pub const APP_NAME: &str = "TermOut";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

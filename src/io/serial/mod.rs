// src/io/serial/mod.rs
//
// Serial session pipeline.
// Provides the single-session supervisor used by the shell.
//
// Features:
// - Background read loop with a configurable poll interval
// - Never-failing byte-to-text decoding with optional line timestamps
// - Fan-out to the display (event channel) and a flushed capture log
// - Direct writes back to the port

pub mod annotate;
pub mod decode;
pub mod log_sink;
pub mod port;
pub mod session;
pub mod supervisor;
pub mod utils;

#[cfg(test)]
pub(crate) mod mock;

pub use log_sink::{resolve_log_path, LogSink, LogSinkError};
pub use port::{choose_default_port, list_serial_ports, PortOpener, SerialLink, SerialPortInfo, SystemPorts};
pub use session::{EndReason, SessionConfig, SessionEvent, SessionEvents};
pub use supervisor::{SendError, SessionRequest, SessionSupervisor, StartError};
pub use utils::{baud_choices, parse_baud_list, ALL_BAUD_RATES, COMMON_BAUD_RATES};

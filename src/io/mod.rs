// src/io/mod.rs
//
// Device IO for the terminal.
// Only local serial ports are supported; each session pairs one open port
// with one capture log.

pub mod serial;

use serde::{Deserialize, Serialize};

// Re-export the session API used by shells
pub use serial::{
    list_serial_ports, EndReason, SendError, SerialPortInfo, SessionConfig, SessionEvent,
    SessionEvents, SessionRequest, SessionSupervisor, StartError,
};

// ============================================================================
// Shared Types
// ============================================================================

/// Lifecycle state of the supervised session.
///
/// Shells watch this to enable or disable their controls: start and the
/// settings editor only while `Idle`, stop and send only while `Running`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Opening,
    Running,
    Stopping,
}

impl SessionState {
    pub fn can_start(&self) -> bool {
        *self == SessionState::Idle
    }

    pub fn can_stop(&self) -> bool {
        *self == SessionState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_enablement() {
        assert!(SessionState::Idle.can_start());
        assert!(!SessionState::Idle.can_stop());
        assert!(SessionState::Running.can_stop());
        assert!(!SessionState::Running.can_start());
        assert!(!SessionState::Opening.can_start());
        assert!(!SessionState::Stopping.can_stop());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SessionState::Running).unwrap(), "\"running\"");
    }
}

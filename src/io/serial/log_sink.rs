// src/io/serial/log_sink.rs
//
// Per-session capture log.
// One file per session, opened in append mode at start and flushed after
// every chunk so a crash loses nothing already shown on screen.

use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Placeholder replaced by the port identifier.
pub const PORT_PLACEHOLDER: &str = "{PORT}";
/// Older spelling of the port placeholder, still found in saved settings.
pub const LEGACY_PORT_PLACEHOLDER: &str = "{COM}";
/// Placeholder replaced by the session start time.
pub const TIME_PLACEHOLDER: &str = "{TIME}";
/// Format of the `{TIME}` substitution.
pub const PATH_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    #[error("Failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write log file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve a log path template for a port at the given start time.
///
/// Device paths such as `/dev/ttyUSB0` contribute only their last component,
/// so the port never introduces extra directories.
pub fn resolve_log_path(template: &str, port: &str, started: &DateTime<Local>) -> PathBuf {
    let port_name = port_file_name(port);
    let time = started.format(PATH_TIME_FORMAT).to_string();
    let resolved = template
        .replace(PORT_PLACEHOLDER, port_name)
        .replace(LEGACY_PORT_PLACEHOLDER, port_name)
        .replace(TIME_PLACEHOLDER, &time);
    PathBuf::from(resolved)
}

fn port_file_name(port: &str) -> &str {
    port.rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or(port)
}

/// Append-only log file bound to one session.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Create missing directories and open `path` for appending.
    pub fn open(path: &Path) -> Result<Self, LogSinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LogSinkError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LogSinkError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one chunk and flush it before returning.
    pub fn append(&mut self, text: &str) -> Result<(), LogSinkError> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|source| LogSinkError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

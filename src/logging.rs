// src/logging.rs
//
// Process diagnostics. `tlog!` lines go to stderr and, once a diagnostics
// directory is configured, to a file there as well. Received device data is
// never written here; the session log sink owns that.

use chrono::{DateTime, Local};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Mirror target for `tlog!`. `None` until `init_file_logging` succeeds.
pub(crate) static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

/// Symlink kept pointing at the newest diagnostics file (Unix only).
pub const LATEST_LOG_NAME: &str = "termout.log";

const CLOCK_FORMAT: &str = "%H:%M:%S%.3f";

/// Wall-clock prefix shared by every diagnostic line.
pub(crate) fn clock() -> String {
    Local::now().format(CLOCK_FORMAT).to_string()
}

/// Write a diagnostic line prefixed with `HH:MM:SS.mmm`.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let line = format!("{} {}", $crate::logging::clock(), format_args!($($arg)*));
        eprintln!("{}", line);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{}", line);
            }
        }
    }};
}

fn diagnostic_file_name(at: &DateTime<Local>) -> String {
    format!("{}-{}", at.format("%Y%m%d-%H%M%S"), LATEST_LOG_NAME)
}

#[cfg(unix)]
fn relink_latest(dir: &Path, file_name: &str) -> std::io::Result<()> {
    let link = dir.join(LATEST_LOG_NAME);
    let _ = std::fs::remove_file(&link);
    std::os::unix::fs::symlink(file_name, link)
}

// Symlinks need elevated rights on Windows
#[cfg(not(unix))]
fn relink_latest(_dir: &Path, _file_name: &str) -> std::io::Result<()> {
    Ok(())
}

/// Swap the mirror target. Returns true if a file was attached before.
fn replace_target(file: Option<File>) -> bool {
    match LOG_FILE.lock() {
        Ok(mut guard) => std::mem::replace(&mut *guard, file).is_some(),
        Err(_) => false,
    }
}

/// Start mirroring diagnostics into a new timestamped file under `dir`.
/// Returns the path of that file.
pub fn init_file_logging(dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Cannot create diagnostics directory {}: {}", dir.display(), e))?;

    let file_name = diagnostic_file_name(&Local::now());
    let path = dir.join(&file_name);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("Cannot open diagnostics file {}: {}", path.display(), e))?;

    if let Err(e) = relink_latest(dir, &file_name) {
        eprintln!("{} [logging] {} not updated: {}", clock(), LATEST_LOG_NAME, e);
    }

    replace_target(Some(file));
    tlog!("[logging] Diagnostics mirrored to {}", path.display());
    Ok(path)
}

/// Detach and close the diagnostics file, if any.
pub fn stop_file_logging() {
    if replace_target(None) {
        eprintln!("{} [logging] Diagnostics file closed", clock());
    }
}

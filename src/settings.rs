// src/settings.rs
//
// Persisted terminal settings.
// Values are stored as strings in named sections of a TOML file; the session
// layer does its own parsing and validation of the typed values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::io::serial::utils::{format_baud_list, parse_baud_list, COMMON_BAUD_RATES, DEFAULT_BAUD_RATE};
use crate::io::serial::SessionRequest;

pub const SETTINGS_SECTION: &str = "Settings";
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

pub const KEY_LAST_COM_PORT: &str = "last_com_port";
pub const KEY_LAST_BAUD_RATE: &str = "last_baud_rate";
pub const KEY_VISIBLE_BAUD_RATES: &str = "visible_baud_rates_list";
pub const KEY_LOG_PATH: &str = "log_path";
pub const KEY_READ_DELAY: &str = "read_delay";
pub const KEY_SHOW_TIMESTAMP: &str = "show_timestamp";

fn default_last_com_port() -> String {
    String::new()
}
fn default_last_baud_rate() -> String {
    DEFAULT_BAUD_RATE.to_string()
}
fn default_visible_baud_rates() -> String {
    format_baud_list(&COMMON_BAUD_RATES)
}
fn default_log_path() -> String {
    "logs/{PORT}_{TIME}.txt".to_string()
}
fn default_read_delay() -> String {
    "0.001".to_string() // 1 ms
}
fn default_show_timestamp() -> String {
    format_bool(false)
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write settings {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parse a boolean stored as a string ("True", "false", "1", "off", ...).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Booleans are persisted as "True"/"False".
pub fn format_bool(value: bool) -> String {
    let s = if value { "True" } else { "False" };
    s.to_string()
}

// ============================================================================
// Store
// ============================================================================

/// Sectioned string key/value settings backed by a TOML file.
#[derive(Clone, Debug, PartialEq)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        let defaults: BTreeMap<String, String> = [
            (KEY_LAST_COM_PORT, default_last_com_port()),
            (KEY_LAST_BAUD_RATE, default_last_baud_rate()),
            (KEY_VISIBLE_BAUD_RATES, default_visible_baud_rates()),
            (KEY_LOG_PATH, default_log_path()),
            (KEY_READ_DELAY, default_read_delay()),
            (KEY_SHOW_TIMESTAMP, default_show_timestamp()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut sections = BTreeMap::new();
        sections.insert(SETTINGS_SECTION.to_string(), defaults);
        Self {
            path: None,
            sections,
        }
    }
}

impl SettingsStore {
    /// Platform config location, e.g. `~/.config/termout/settings.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("termout")
            .join(SETTINGS_FILE_NAME)
    }

    /// Load settings from `path`, layered over the defaults.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if !path.exists() {
            tlog!("[Settings] {} not found, using defaults", path.display());
            return Ok(store);
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table: toml::Table = toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        for (section, value) in table {
            match value {
                toml::Value::Table(entries) => {
                    for (key, v) in entries {
                        store.set(&section, &key, value_to_string(v));
                    }
                }
                other => {
                    tlog!(
                        "[Settings] Ignoring top-level key '{}' = {} (not in a section)",
                        section,
                        other
                    );
                }
            }
        }

        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    /// Value of `section.key`, or `fallback` when it is not set.
    pub fn get(&self, section: &str, key: &str, fallback: &str) -> String {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string(&self.sections)?)
    }

    /// Write to the store's path (atomic write). A store without a path is not persisted.
    pub fn save(&self) -> Result<(), SettingsError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let content = self.to_toml_string()?;

        let write_err = |source: std::io::Error| SettingsError::Write {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, content).map_err(write_err)?;
        std::fs::rename(&tmp_path, path).map_err(write_err)?;
        Ok(())
    }
}

fn value_to_string(value: toml::Value) -> String {
    match value {
        toml::Value::String(s) => s,
        other => other.to_string(),
    }
}

// ============================================================================
// Typed View
// ============================================================================

/// Typed snapshot of the `[Settings]` section.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub last_com_port: String,
    /// Kept as entered; validated when a session starts
    pub last_baud_rate: String,
    pub visible_baud_rates: Vec<u32>,
    pub log_path: String,
    /// Seconds, fractional allowed; validated when a session starts
    pub read_delay: String,
    pub show_timestamp: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self::from_store(&SettingsStore::default())
    }
}

impl AppSettings {
    pub fn from_store(store: &SettingsStore) -> Self {
        let get = |key: &str, fallback: String| store.get(SETTINGS_SECTION, key, &fallback);

        let mut visible_baud_rates =
            parse_baud_list(&get(KEY_VISIBLE_BAUD_RATES, default_visible_baud_rates()));
        if visible_baud_rates.is_empty() {
            visible_baud_rates = COMMON_BAUD_RATES.to_vec();
        }

        Self {
            last_com_port: get(KEY_LAST_COM_PORT, default_last_com_port()),
            last_baud_rate: get(KEY_LAST_BAUD_RATE, default_last_baud_rate()),
            visible_baud_rates,
            log_path: get(KEY_LOG_PATH, default_log_path()),
            read_delay: get(KEY_READ_DELAY, default_read_delay()),
            show_timestamp: parse_bool(&get(KEY_SHOW_TIMESTAMP, default_show_timestamp()))
                .unwrap_or(false),
        }
    }

    /// Record the last used values. The visible baud list is edited by hand
    /// in the settings file and is left untouched.
    pub fn store_into(&self, store: &mut SettingsStore) {
        store.set(SETTINGS_SECTION, KEY_LAST_COM_PORT, self.last_com_port.as_str());
        store.set(SETTINGS_SECTION, KEY_LAST_BAUD_RATE, self.last_baud_rate.as_str());
        store.set(SETTINGS_SECTION, KEY_LOG_PATH, self.log_path.as_str());
        store.set(SETTINGS_SECTION, KEY_READ_DELAY, self.read_delay.as_str());
        store.set(SETTINGS_SECTION, KEY_SHOW_TIMESTAMP, format_bool(self.show_timestamp));
    }

    /// The last baud rate as a number, if it parses.
    pub fn last_baud(&self) -> Option<u32> {
        self.last_baud_rate.trim().parse().ok()
    }

    /// Build a start request for `port` from these settings.
    pub fn session_request(&self, port: &str) -> SessionRequest {
        SessionRequest {
            port: port.to_string(),
            baud_rate: self.last_baud_rate.clone(),
            log_path: self.log_path.clone(),
            read_delay: self.read_delay.clone(),
            show_timestamp: self.show_timestamp,
        }
    }
}

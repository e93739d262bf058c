// src/io/serial/utils.rs
//
// Baud rate lists and helpers for building the baud rate picker.

// ============================================================================
// Constants
// ============================================================================

/// Rates offered by default
pub const COMMON_BAUD_RATES: [u32; 6] = [9600, 19200, 38400, 57600, 115200, 3000000];

/// Every standard rate, offered when the user asks to see all of them
pub const ALL_BAUD_RATES: [u32; 31] = [
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 14400, 19200, 38400,
    57600, 115200, 230400, 460800, 500000, 576000, 921600, 1000000, 1152000, 1500000, 2000000,
    2500000, 3000000, 3500000, 4000000,
];

pub const DEFAULT_BAUD_RATE: u32 = 115200;

// ============================================================================
// Conversion Functions
// ============================================================================

/// Parse a comma-separated baud rate list, skipping entries that are not positive integers
pub fn parse_baud_list(s: &str) -> Vec<u32> {
    s.split(',')
        .filter_map(|item| item.trim().parse::<u32>().ok())
        .filter(|b| *b > 0)
        .collect()
}

/// Format a baud rate list the way it is persisted ("9600,19200,...")
pub fn format_baud_list(rates: &[u32]) -> String {
    rates
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Rates to offer and the rate to keep selected.
///
/// The current selection survives when it is in the offered list; otherwise
/// the picker falls back to the last used rate.
pub fn baud_choices(show_all: bool, visible: &[u32], selected: u32, last: u32) -> (Vec<u32>, u32) {
    let offered: Vec<u32> = if show_all {
        ALL_BAUD_RATES.to_vec()
    } else if visible.is_empty() {
        COMMON_BAUD_RATES.to_vec()
    } else {
        visible.to_vec()
    };
    let keep = if offered.contains(&selected) { selected } else { last };
    (offered, keep)
}

// ============================================================================
// Tests
// ============================================================================

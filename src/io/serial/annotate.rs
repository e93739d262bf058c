// src/io/serial/annotate.rs
//
// Prepares decoded text for the display and log sinks.

use chrono::{DateTime, Local};

/// Tag shown before received data in the live view when timestamps are off.
pub const RECEIVED_TAG: &str = "Received: ";

/// Timestamp format applied to each line (microsecond resolution).
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Text for one chunk, split by destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotated {
    /// Text appended to the display sink
    pub display: String,
    /// Text appended to the session log
    pub log: String,
}

/// Annotate one decoded chunk.
///
/// `timestamp` is captured once per chunk by the caller; `None` means
/// timestamp mode is off. Given the same inputs the output is identical.
pub fn annotate(text: &str, timestamp: Option<&DateTime<Local>>) -> Annotated {
    match timestamp {
        None => Annotated {
            display: format!("{}{}\n", RECEIVED_TAG, text),
            log: text.to_string(),
        },
        Some(ts) => {
            let stamped = stamp_lines(text, ts);
            Annotated {
                display: stamped.clone(),
                log: stamped,
            }
        }
    }
}

/// Prefix every line with the chunk timestamp. Each output line ends with `\n`.
fn stamp_lines(text: &str, ts: &DateTime<Local>) -> String {
    let prefix = ts.format(LINE_TIMESTAMP_FORMAT).to_string();
    let mut out = String::with_capacity(text.len() + 32);
    for line in split_lines(text) {
        out.push_str(&prefix);
        out.push_str(" - ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Characters that end a line: `\n`, `\r` (alone or before `\n`), vertical
/// tab, form feed, the file/group/record separators, NEL and the Unicode line
/// and paragraph separators.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Split on every line break. A trailing break does not yield an empty line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        let mut end = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                end = j + 1;
            }
        }
        start = end;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

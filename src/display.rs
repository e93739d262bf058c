// src/display.rs
//
// Display side of the session pipeline.
// The foreground drains session events into a `DisplaySink`; the read loop
// never touches the display directly.

use std::io::Write;

use crate::io::serial::{EndReason, SessionEvent, SessionEvents};

/// Text surface that shows the live session.
pub trait DisplaySink {
    fn append(&mut self, text: &str);
    fn scroll_to_end(&mut self);
}

impl SessionEvent {
    /// Text to show for this event, if any.
    pub fn display_text(&self) -> Option<String> {
        match self {
            SessionEvent::Opened { port, baud_rate, .. } => {
                Some(format!("Opened {} at {} baud rate.\n", port, baud_rate))
            }
            SessionEvent::Received(text) => Some(text.clone()),
            SessionEvent::Sent(msg) => Some(format!("Sent: {}\n", msg)),
            SessionEvent::Ended(EndReason::Stopped) => {
                Some("Serial communication stopped.\n".to_string())
            }
            SessionEvent::Ended(EndReason::Disconnected) => Some("Port closed.\n".to_string()),
            SessionEvent::Ended(EndReason::ReadError(e)) => Some(format!("{}\n", e)),
            SessionEvent::Ended(EndReason::LogWriteFailed(e)) => Some(format!("{}\n", e)),
        }
    }
}

/// Show one event. Returns true when the event ends the session.
pub fn show_event(event: &SessionEvent, sink: &mut dyn DisplaySink) -> bool {
    if let Some(text) = event.display_text() {
        sink.append(&text);
        sink.scroll_to_end();
    }
    matches!(event, SessionEvent::Ended(_))
}

/// Drain every pending event without blocking.
/// Returns the number of events shown and whether the session ended.
pub fn drain_events(events: &mut SessionEvents, sink: &mut dyn DisplaySink) -> (usize, bool) {
    let mut shown = 0;
    let mut ended = false;
    while let Ok(event) = events.try_recv() {
        ended |= show_event(&event, sink);
        shown += 1;
    }
    (shown, ended)
}

/// Display sink over any writer, e.g. stdout.
pub struct WriterSink<W: Write> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for WriterSink<W> {
    fn append(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
    }

    fn scroll_to_end(&mut self) {
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        text: String,
        scrolls: usize,
    }

    impl DisplaySink for Recorder {
        fn append(&mut self, text: &str) {
            self.text.push_str(text);
        }

        fn scroll_to_end(&mut self) {
            self.scrolls += 1;
        }
    }

    #[test]
    fn test_status_lines() {
        let opened = SessionEvent::Opened {
            port: "COM3".to_string(),
            baud_rate: 115200,
            log_path: PathBuf::from("logs/COM3.txt"),
        };
        assert_eq!(opened.display_text().unwrap(), "Opened COM3 at 115200 baud rate.\n");
        assert_eq!(
            SessionEvent::Sent("ping".to_string()).display_text().unwrap(),
            "Sent: ping\n"
        );
        assert_eq!(
            SessionEvent::Ended(EndReason::Stopped).display_text().unwrap(),
            "Serial communication stopped.\n"
        );
    }

    #[test]
    fn test_drain_in_order_and_scrolls() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Received("Received: a\n".to_string())).unwrap();
        tx.send(SessionEvent::Received("Received: b\n".to_string())).unwrap();

        let mut sink = Recorder::default();
        assert_eq!(drain_events(&mut rx, &mut sink), (2, false));
        assert_eq!(sink.text, "Received: a\nReceived: b\n");
        assert_eq!(sink.scrolls, 2);

        tx.send(SessionEvent::Ended(EndReason::Disconnected)).unwrap();
        assert_eq!(drain_events(&mut rx, &mut sink), (1, true));
    }

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new());
        show_event(&SessionEvent::Received("Received: Hello\n".to_string()), &mut sink);
        assert_eq!(sink.into_inner(), b"Received: Hello\n".to_vec());
    }
}

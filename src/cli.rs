// src/cli.rs
//
// Command-line shell for the terminal.
// Resolves the session parameters from saved settings and flags, then runs
// the supervisor: stdin lines are sent to the port, session events are
// printed to stdout.

use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;

use crate::display::{drain_events, show_event, DisplaySink, WriterSink};
use crate::io::serial::{baud_choices, choose_default_port, list_serial_ports, SessionEvents};
use crate::io::{SessionRequest, SessionSupervisor};
use crate::logging::{init_file_logging, stop_file_logging};
use crate::settings::{AppSettings, SettingsStore};

#[derive(Parser, Debug)]
#[command(name = "termout", version, about = "Live serial-port terminal with capture logging")]
pub struct Args {
    /// List available serial ports and exit
    #[arg(long)]
    pub list: bool,

    /// Print the port list as JSON
    #[arg(long, requires = "list")]
    pub json: bool,

    /// Serial port to open (defaults to the last used port)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<String>,

    /// Log path template; `{PORT}` and `{TIME}` are substituted at start
    #[arg(long)]
    pub log_path: Option<String>,

    /// Seconds to wait between polls when no data is waiting
    #[arg(long)]
    pub read_delay: Option<String>,

    /// Prefix every received line with a timestamp
    #[arg(long, conflicts_with = "no_timestamp")]
    pub timestamp: bool,

    /// Show received data without timestamps
    #[arg(long)]
    pub no_timestamp: bool,

    /// Accept any standard baud rate without warning
    #[arg(long)]
    pub show_all_bauds: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Write diagnostic logs to this directory
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,
}

pub fn run() -> ExitCode {
    let args = Args::parse();

    if let Some(ref dir) = args.diagnostics {
        if let Err(e) = init_file_logging(dir) {
            tlog!("[cli] {}", e);
        }
    }

    let code = match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    };

    stop_file_logging();
    code
}

fn execute(args: Args) -> Result<(), String> {
    if args.list {
        return print_ports(args.json);
    }

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(SettingsStore::default_path);
    let mut store = SettingsStore::load(&settings_path).map_err(|e| e.to_string())?;
    let mut settings = AppSettings::from_store(&store);
    apply_overrides(&args, &mut settings);

    let port = match args.port.clone() {
        Some(p) => p,
        None => {
            let available: Vec<String> = list_serial_ports()
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.port_name)
                .collect();
            choose_default_port(&available, &settings.last_com_port)
                .ok_or_else(|| "No serial port selected and none detected".to_string())?
        }
    };
    settings.last_com_port = port.clone();

    let request = settings.session_request(&port);
    let config = request.parse().map_err(|e| e.to_string())?;

    let last = AppSettings::from_store(&store).last_baud().unwrap_or(config.baud_rate);
    let (offered, _) = baud_choices(
        args.show_all_bauds,
        &settings.visible_baud_rates,
        config.baud_rate,
        last,
    );
    if !offered.contains(&config.baud_rate) {
        tlog!(
            "[cli] Baud rate {} is not in the offered list {:?}",
            config.baud_rate,
            offered
        );
    }

    // Remember what was used, like the settings dialog does on start
    settings.store_into(&mut store);
    if let Err(e) = store.save() {
        tlog!("[cli] {}", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    let result = runtime.block_on(interact(request));
    // The stdin reader may still be parked in a read
    runtime.shutdown_background();
    result
}

fn apply_overrides(args: &Args, settings: &mut AppSettings) {
    if let Some(ref baud) = args.baud {
        settings.last_baud_rate = baud.clone();
    }
    if let Some(ref log_path) = args.log_path {
        settings.log_path = log_path.clone();
    }
    if let Some(ref read_delay) = args.read_delay {
        settings.read_delay = read_delay.clone();
    }
    if args.timestamp {
        settings.show_timestamp = true;
    }
    if args.no_timestamp {
        settings.show_timestamp = false;
    }
}

fn print_ports(json: bool) -> Result<(), String> {
    let ports = list_serial_ports()?;

    if json {
        let out = serde_json::to_string_pretty(&ports)
            .map_err(|e| format!("Failed to serialize port list: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    if ports.is_empty() {
        println!("No serial ports available");
    }
    for p in ports {
        let detail = [p.manufacturer, p.product]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}\t{}\t{}", p.port_name, p.port_type, detail);
    }
    Ok(())
}

/// Run one session until it ends, stdin closes, or Ctrl-C.
async fn interact(request: SessionRequest) -> Result<(), String> {
    let (mut supervisor, events) = SessionSupervisor::with_system_ports();
    supervisor.start(&request).map_err(|e| e.to_string())?;

    let input = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let mut display = WriterSink::new(std::io::stdout());
    run_session(&mut supervisor, events, input, &mut display).await;
    Ok(())
}

/// Forward input lines from a plain thread. A blocking read there never
/// holds up the runtime; the channel closes on EOF or a read error.
fn spawn_line_reader<R: BufRead + Send + 'static>(reader: R) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tlog!("[cli] stdin error: {}", e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tlog!("[cli] Failed to start stdin reader: {}", e);
    }
    rx
}

/// Pump events and input for a started session, then stop it and show
/// whatever the read loop emitted on the way out.
async fn run_session(
    supervisor: &mut SessionSupervisor,
    mut events: SessionEvents,
    mut input: mpsc::UnboundedReceiver<String>,
    display: &mut dyn DisplaySink,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ev) => {
                    if show_event(&ev, display) {
                        break;
                    }
                }
                None => break,
            },
            line = input.recv() => match line {
                Some(line) if line.is_empty() => {}
                Some(line) => {
                    if let Err(e) = supervisor.send(&line) {
                        display.append(&format!("Send failed: {}\n", e));
                        display.scroll_to_end();
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // stop() joins the read loop thread
    tokio::task::block_in_place(|| supervisor.stop());
    drain_events(&mut events, display);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::mock::{MockHandle, MockOpener, MockRead};
    use std::time::Duration;

    fn cli_request(dir: &std::path::Path) -> SessionRequest {
        SessionRequest {
            port: "COM_CLI".to_string(),
            baud_rate: "9600".to_string(),
            log_path: dir.join("{PORT}.txt").to_string_lossy().into_owned(),
            read_delay: "0.001".to_string(),
            show_timestamp: false,
        }
    }

    #[test]
    fn test_overrides_replace_settings() {
        let args = Args::parse_from([
            "termout",
            "--port",
            "COM9",
            "--baud",
            "9600",
            "--read-delay",
            "0.5",
            "--timestamp",
        ]);
        let mut settings = AppSettings::default();
        apply_overrides(&args, &mut settings);

        assert_eq!(settings.last_baud_rate, "9600");
        assert_eq!(settings.read_delay, "0.5");
        assert!(settings.show_timestamp);
        assert_eq!(settings.log_path, "logs/{PORT}_{TIME}.txt");
    }

    #[test]
    fn test_no_timestamp_override() {
        let args = Args::parse_from(["termout", "--no-timestamp"]);
        let mut settings = AppSettings {
            show_timestamp: true,
            ..AppSettings::default()
        };
        apply_overrides(&args, &mut settings);
        assert!(!settings.show_timestamp);
    }

    #[test]
    fn test_conflicting_timestamp_flags_rejected() {
        assert!(Args::try_parse_from(["termout", "--timestamp", "--no-timestamp"]).is_err());
    }

    #[test]
    fn test_json_requires_list() {
        assert!(Args::try_parse_from(["termout", "--json"]).is_err());
        assert!(Args::try_parse_from(["termout", "--list", "--json"]).is_ok());
    }

    #[test]
    fn test_line_reader_forwards_lines_then_closes() {
        let mut rx = spawn_line_reader(std::io::Cursor::new("ping\n\npong\n"));
        assert_eq!(rx.blocking_recv().as_deref(), Some("ping"));
        assert_eq!(rx.blocking_recv().as_deref(), Some(""));
        assert_eq!(rx.blocking_recv().as_deref(), Some("pong"));
        assert_eq!(rx.blocking_recv(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_session_end_returns_while_input_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let handle = MockHandle::new(vec![MockRead::Data(b"Hello".to_vec())], true);
        let (mut sup, events) = SessionSupervisor::new(MockOpener::new(handle));
        sup.start(&cli_request(dir.path())).unwrap();

        // Sender held for the whole test: input never reaches EOF
        let (_tx, input) = mpsc::unbounded_channel();
        let mut display = WriterSink::new(Vec::new());
        tokio::time::timeout(
            Duration::from_secs(5),
            run_session(&mut sup, events, input, &mut display),
        )
        .await
        .expect("shell kept waiting after the port closed");

        let out = String::from_utf8(display.into_inner()).unwrap();
        assert!(out.contains("Received: Hello\n"), "{}", out);
        assert!(out.ends_with("Port closed.\n"), "{}", out);
        assert!(!sup.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_input_lines_are_sent_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let handle = MockHandle::new(vec![MockRead::Idle], false);
        let (mut sup, events) = SessionSupervisor::new(MockOpener::new(handle.clone()));
        sup.start(&cli_request(dir.path())).unwrap();

        let (tx, input) = mpsc::unbounded_channel();
        tx.send("ping".to_string()).unwrap();
        tx.send(String::new()).unwrap();
        drop(tx);

        let mut display = WriterSink::new(Vec::new());
        tokio::time::timeout(
            Duration::from_secs(5),
            run_session(&mut sup, events, input, &mut display),
        )
        .await
        .unwrap();

        assert_eq!(handle.written(), b"ping".to_vec());
        let out = String::from_utf8(display.into_inner()).unwrap();
        assert!(out.contains("Sent: ping\n"), "{}", out);
        assert!(out.ends_with("Serial communication stopped.\n"), "{}", out);
    }
}

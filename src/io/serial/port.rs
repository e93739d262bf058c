// src/io/serial/port.rs
//
// Port abstraction for the session pipeline.
// The session talks to a `SerialLink`; `SystemPorts` opens real devices via
// the serialport crate, tests substitute a scripted port.

use serde::Serialize;
use std::io::{Read, Write};
use std::time::Duration;

/// Timeout applied when claiming a device and on blocking read/write calls.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Traits
// ============================================================================

/// An open, bidirectional byte stream to a device.
pub trait SerialLink: Send {
    /// Number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> std::io::Result<usize>;

    /// Read up to `buf.len()` bytes.
    fn read_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Write all of `data` and flush it to the device.
    fn write_bytes(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// False once the device has gone away on its own.
    fn is_open(&self) -> bool {
        true
    }
}

/// Claims a device by name.
pub trait PortOpener: Send {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>, String>;
}

// ============================================================================
// Native Ports
// ============================================================================

/// A device opened through the serialport crate. Dropping it closes the port.
pub struct NativePort {
    inner: Box<dyn serialport::SerialPort>,
}

impl SerialLink for NativePort {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        self.inner
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(std::io::Error::from)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }

    fn write_bytes(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(data)?;
        self.inner.flush()
    }
}

/// Opens local serial devices (8 data bits, no parity, 1 stop bit).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemPorts;

impl PortOpener for SystemPorts {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>, String> {
        let inner = serialport::new(port, baud_rate)
            .timeout(OPEN_TIMEOUT)
            .open()
            .map_err(|e| format!("Failed to open {}: {}", port, e))?;
        Ok(Box::new(NativePort { inner }))
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// One entry of the port picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    /// "USB", "Bluetooth", "PCI" or "Unknown"
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl From<serialport::SerialPortInfo> for SerialPortInfo {
    fn from(p: serialport::SerialPortInfo) -> Self {
        let mut info = SerialPortInfo {
            port_name: p.port_name,
            port_type: String::new(),
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        };
        info.port_type = match p.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                info.manufacturer = usb.manufacturer;
                info.product = usb.product;
                info.serial_number = usb.serial_number;
                info.vid = Some(usb.vid);
                info.pid = Some(usb.pid);
                "USB"
            }
            serialport::SerialPortType::BluetoothPort => "Bluetooth",
            serialport::SerialPortType::PciPort => "PCI",
            serialport::SerialPortType::Unknown => "Unknown",
        }
        .to_string();
        info
    }
}

/// macOS exposes every device twice. Only the `/dev/cu.*` side is offered:
/// opening `/dev/tty.*` waits for carrier detect.
fn is_offered(port_name: &str, hide_dialin: bool) -> bool {
    !(hide_dialin && port_name.starts_with("/dev/tty."))
}

/// Ports the terminal can open, sorted by name.
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, String> {
    let found = serialport::available_ports()
        .map_err(|e| format!("Failed to enumerate ports: {}", e))?;

    let hide_dialin = cfg!(target_os = "macos");
    let mut ports: Vec<SerialPortInfo> = found
        .into_iter()
        .filter(|p| is_offered(&p.port_name, hide_dialin))
        .map(SerialPortInfo::from)
        .collect();
    ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    Ok(ports)
}

/// Pick the port to preselect: the last used one if it is still present,
/// otherwise the first available.
pub fn choose_default_port(available: &[String], last: &str) -> Option<String> {
    if !last.is_empty() && available.iter().any(|p| p == last) {
        return Some(last.to_string());
    }
    available.first().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_choose_last_port_when_present() {
        let available = ports(&["COM1", "COM3", "COM7"]);
        assert_eq!(choose_default_port(&available, "COM3"), Some("COM3".to_string()));
    }

    #[test]
    fn test_choose_first_port_when_last_missing() {
        let available = ports(&["COM1", "COM3"]);
        assert_eq!(choose_default_port(&available, "COM9"), Some("COM1".to_string()));
        assert_eq!(choose_default_port(&available, ""), Some("COM1".to_string()));
    }

    #[test]
    fn test_choose_none_without_ports() {
        assert_eq!(choose_default_port(&[], "COM3"), None);
    }

    #[test]
    fn test_dialin_devices_hidden_only_when_asked() {
        assert!(!is_offered("/dev/tty.usbserial-1410", true));
        assert!(is_offered("/dev/cu.usbserial-1410", true));
        assert!(is_offered("/dev/ttyUSB0", true));
        assert!(is_offered("/dev/tty.usbserial-1410", false));
    }

    #[test]
    fn test_usb_port_info_carries_descriptor() {
        let info = SerialPortInfo::from(serialport::SerialPortInfo {
            port_name: "/dev/ttyACM0".to_string(),
            port_type: serialport::SerialPortType::UsbPort(serialport::UsbPortInfo {
                vid: 0x2341,
                pid: 0x0043,
                serial_number: Some("A1".to_string()),
                manufacturer: Some("Arduino".to_string()),
                product: Some("Uno".to_string()),
            }),
        });
        assert_eq!(info.port_type, "USB");
        assert_eq!(info.vid, Some(0x2341));
        assert_eq!(info.product.as_deref(), Some("Uno"));
    }

    #[test]
    fn test_non_usb_port_info_has_no_descriptor() {
        let info = SerialPortInfo::from(serialport::SerialPortInfo {
            port_name: "COM1".to_string(),
            port_type: serialport::SerialPortType::PciPort,
        });
        assert_eq!(info.port_type, "PCI");
        assert_eq!(info.manufacturer, None);
        assert_eq!(info.vid, None);
    }

    #[test]
    fn test_open_missing_device_fails() {
        let err = SystemPorts
            .open("/nonexistent/termout-test-port", 9600)
            .err()
            .unwrap();
        assert!(err.contains("/nonexistent/termout-test-port"));
    }
}

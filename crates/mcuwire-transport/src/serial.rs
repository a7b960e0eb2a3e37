use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::link::LinkStream;

/// Default line rate for device links.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial line settings. Framing is always 8N1 without flow control.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Line rate in bits per second.
    pub baud_rate: u32,
    /// Per-operation timeout applied to reads and writes.
    pub timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(80),
        }
    }
}

/// A discovered serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS port name (`/dev/ttyUSB0`, `COM6`).
    pub name: String,
    /// Coarse port kind: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
}

/// Open a serial port as a device link.
pub fn open_serial(port: &str, settings: &SerialSettings) -> Result<LinkStream> {
    let opened = serialport::new(port, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(settings.timeout)
        .open()
        .map_err(|err| TransportError::Open {
            port: port.to_string(),
            source: err.into(),
        })?;

    info!(port, baud = settings.baud_rate, "opened serial port");
    Ok(LinkStream::from_serial(opened))
}

/// List serial ports known to the OS, sorted by name.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports =
        serialport::available_ports().map_err(|err| TransportError::Enumerate(err.to_string()))?;

    let mut out: Vec<PortInfo> = ports
        .into_iter()
        .map(|port| PortInfo {
            kind: port_kind(&port.port_type),
            name: port.port_name,
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = out.len(), "enumerated serial ports");
    Ok(out)
}

fn port_kind(port_type: &SerialPortType) -> &'static str {
    match port_type {
        SerialPortType::UsbPort(_) => "usb",
        SerialPortType::PciPort => "pci",
        SerialPortType::BluetoothPort => "bluetooth",
        SerialPortType::Unknown => "unknown",
    }
}

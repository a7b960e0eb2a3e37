use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use mcuwire_frame::ValueType;
use mcuwire_session::{EventSink, Session, SessionConfig};
use mcuwire_transport::{SerialSettings, DEFAULT_BAUD_RATE};

use crate::exit::{session_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod heartbeat;
pub mod hello;
pub mod motor;
pub mod ports;
pub mod read;
pub mod scope;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports(PortsArgs),
    /// Handshake and print protocol version and capabilities.
    Hello(HelloArgs),
    /// Poll the device heartbeat.
    Heartbeat(HeartbeatArgs),
    /// Read one typed value from device memory.
    Read(ReadArgs),
    /// Write one typed value to device memory.
    Write(WriteArgs),
    /// Change the motor mode.
    Motor(MotorArgs),
    /// Stream scope samples.
    Scope(ScopeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Hello(args) => hello::run(args, format),
        Command::Heartbeat(args) => heartbeat::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Write(args) => write::run(args, format),
        Command::Motor(args) => motor::run(args, format),
        Command::Scope(args) => scope::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Link options shared by every command that talks to a device.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Serial port (e.g. /dev/ttyUSB0, COM6).
    #[arg(long, short = 'p', env = "MCUWIRE_PORT")]
    pub port: String,
    /// Line rate in bits per second.
    #[arg(long, env = "MCUWIRE_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Per-request timeout (e.g. 700ms, 2s).
    #[arg(long, env = "MCUWIRE_TIMEOUT", default_value = "700ms")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct HelloArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct HeartbeatArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Number of polls.
    #[arg(long, default_value_t = 1)]
    pub count: u32,
    /// Delay between polls.
    #[arg(long, default_value = "800ms")]
    pub interval: String,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Address, decimal or 0x-prefixed hex.
    #[arg(value_parser = parse_address)]
    pub address: u32,
    /// Value type (u8, s8, u16, s16, u32, s32, f32).
    #[arg(long = "type", short = 't')]
    pub value_type: ValueType,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Address, decimal or 0x-prefixed hex.
    #[arg(value_parser = parse_address)]
    pub address: u32,
    /// Value to write. Integer types saturate at their range.
    #[arg(allow_negative_numbers = true)]
    pub value: f64,
    /// Value type (u8, s8, u16, s16, u32, s32, f32).
    #[arg(long = "type", short = 't')]
    pub value_type: ValueType,
}

#[derive(Args, Debug)]
pub struct MotorArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Motor mode byte.
    pub mode: u8,
}

#[derive(Args, Debug)]
pub struct ScopeArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Requested sample period in milliseconds.
    #[arg(long, default_value_t = 10)]
    pub period_ms: u16,
    /// Stop after N sample batches. Runs until Ctrl-C if omitted.
    #[arg(long)]
    pub batches: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open a session on the configured port.
pub fn open_session(device: &DeviceArgs, sink: impl EventSink + 'static) -> CliResult<Session> {
    let timeout = parse_duration(&device.timeout)?;
    let config = SessionConfig {
        request_timeout: timeout,
        scope_control_timeout: timeout.max(SessionConfig::default().scope_control_timeout),
        ..SessionConfig::default()
    };
    let settings = SerialSettings {
        baud_rate: device.baud,
        ..SerialSettings::default()
    };

    let session = Session::new(config, sink);
    session
        .connect(&device.port, &settings)
        .map_err(|err| session_error("connect failed", err))?;
    Ok(session)
}

/// Clear `running` on Ctrl-C so polling loops can wind down and disconnect.
pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Parse a decimal or `0x` hex address.
pub fn parse_address(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid address '{input}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_address_forms() {
        assert_eq!(parse_address("0x20000010").unwrap(), 0x2000_0010);
        assert_eq!(parse_address("0X2000_0010").unwrap(), 0x2000_0010);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert!(parse_address("0xZZ").is_err());
        assert!(parse_address("-1").is_err());
        assert!(parse_address("0x1_0000_0000").is_err());
    }
}

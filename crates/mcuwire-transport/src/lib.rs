//! Byte link abstraction for talking to a microcontroller.
//!
//! Provides a unified [`LinkStream`] over:
//! - serial ports (via the `serialport` crate)
//! - connected Unix socket pairs (device emulators and loopback tests)
//!
//! This is the lowest layer of mcuwire. Framing and request correlation
//! build on top of the [`LinkStream`] type provided here.

pub mod error;
pub mod link;
pub mod serial;

pub use error::{Result, TransportError};
pub use link::LinkStream;
pub use serial::{list_ports, open_serial, PortInfo, SerialSettings, DEFAULT_BAUD_RATE};

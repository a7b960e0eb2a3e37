//! Framed request/response and telemetry over microcontroller serial links.
//!
//! mcuwire talks to firmware over a UART using a small binary protocol:
//! CRC-checked frames, numbered requests with per-request timeouts, and
//! unsolicited device events (log text, scope samples) multiplexed on the
//! same line.
//!
//! # Crate Structure
//!
//! - [`transport`]: the byte link (serial ports, loopback socket pairs)
//! - [`frame`]: wire format, payload bodies, typed values, stream decoder
//! - [`session`]: request correlation, timeouts, event delivery

/// Re-export transport types.
pub mod transport {
    pub use mcuwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mcuwire_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use mcuwire_session::*;
}

pub use mcuwire_session::{Session, SessionConfig, SessionError, SessionEvent};

//! Command codes.
//!
//! Codes below 0x8000 are request/response commands issued by the host.
//! Codes from 0x8000 up are unsolicited device events.

/// Capability handshake.
pub const HELLO: u16 = 0x0001;

/// Liveness poll with loop tick and drop counters.
pub const HEARTBEAT: u16 = 0x0002;

/// Motor mode change.
pub const MOTOR_CONTROL: u16 = 0x0100;

/// Read one typed value from device memory.
pub const READ_TYPED: u16 = 0x0300;

/// Write one typed value to device memory.
pub const WRITE_TYPED: u16 = 0x0301;

/// Read a block of raw device memory.
pub const READ_BLOCK: u16 = 0x0302;

/// Write a block of raw device memory.
pub const WRITE_BLOCK: u16 = 0x0303;

/// Describe the scope channel layout.
pub const SCOPE_LAYOUT: u16 = 0x0400;

/// Enable or disable device-side scope sampling.
pub const SCOPE_CONTROL: u16 = 0x0401;

/// Event: UTF-8 log text from the device.
pub const EVENT_LOG_TEXT: u16 = 0x8001;

/// Event: one streaming scope sample.
pub const EVENT_SCOPE_DATA: u16 = 0x8400;

/// First code in the event range.
pub const EVENT_RANGE_START: u16 = 0x8000;

/// Returns a human-readable name for a command code.
pub fn command_name(code: u16) -> &'static str {
    match code {
        HELLO => "HELLO",
        HEARTBEAT => "HEARTBEAT",
        MOTOR_CONTROL => "MOTOR_CTRL",
        READ_TYPED => "READ_TYPED",
        WRITE_TYPED => "WRITE_TYPED",
        READ_BLOCK => "READ_BLOCK",
        WRITE_BLOCK => "WRITE_BLOCK",
        SCOPE_LAYOUT => "SCOPE_LAYOUT",
        SCOPE_CONTROL => "SCOPE_CTRL",
        EVENT_LOG_TEXT => "EVT_LOG_TEXT",
        EVENT_SCOPE_DATA => "EVT_SCOPE_DATA",
        EVENT_RANGE_START..=u16::MAX => "EVT_UNKNOWN",
        _ => "UNKNOWN",
    }
}

/// Returns true if the code is in the event range.
pub fn is_event(code: u16) -> bool {
    code >= EVENT_RANGE_START
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_known_codes() {
        assert_eq!(command_name(HELLO), "HELLO");
        assert_eq!(command_name(SCOPE_CONTROL), "SCOPE_CTRL");
        assert_eq!(command_name(EVENT_SCOPE_DATA), "EVT_SCOPE_DATA");
    }

    #[test]
    fn unknown_codes_fall_into_ranges() {
        assert_eq!(command_name(0x0999), "UNKNOWN");
        assert_eq!(command_name(0x9000), "EVT_UNKNOWN");
    }

    #[test]
    fn event_range_boundary() {
        assert!(!is_event(SCOPE_CONTROL));
        assert!(is_event(EVENT_LOG_TEXT));
        assert!(is_event(EVENT_RANGE_START));
    }
}

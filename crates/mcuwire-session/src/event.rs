//! Events published by a session.
//!
//! The session never calls back into the caller directly. Everything it has
//! to report (state changes, telemetry, write outcomes, faults, log text)
//! goes through one injected [`EventSink`], usually from the reader thread.

use std::fmt;
use std::sync::mpsc;
use std::time::SystemTime;

use serde::Serialize;

/// Link state as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Idle,
    Connecting,
    Connected,
    Streaming,
    Reconnecting,
    Error,
}

impl TransportState {
    /// True while requests can be issued.
    pub fn is_connected(self) -> bool {
        matches!(self, TransportState::Connected | TransportState::Streaming)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Idle => "idle",
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Streaming => "streaming",
            TransportState::Reconnecting => "reconnecting",
            TransportState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Scope samples decoded from one streaming event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleBatch {
    pub timestamp: SystemTime,
    /// One sequence of samples per active channel.
    pub channels: Vec<Vec<f64>>,
    /// Events per second since streaming was last started.
    pub sample_rate_hz: f64,
    /// The device's sample counter.
    pub source_sequence: u32,
}

/// Outcome of a typed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub timestamp: SystemTime,
    /// Target address, formatted `0x%08X`.
    pub target: String,
    pub success: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultSeverity {
    Warning,
    Critical,
}

/// Fault code for a command the device refused.
pub const FAULT_CMD_FAIL: &str = "CMD_FAIL";

/// Fault code for a failed or closed link.
pub const FAULT_LINK_IO: &str = "LINK_IO";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultEvent {
    pub timestamp: SystemTime,
    pub severity: FaultSeverity,
    pub code: String,
    pub message: String,
    pub context: String,
}

/// Log categories used by the session.
pub mod category {
    /// Link open/close and I/O failures.
    pub const LINK: &str = "LINK";
    /// Protocol-level activity: handshake, streaming.
    pub const PROTO: &str = "PROTO";
    /// Outcomes of device commands.
    pub const CMD: &str = "CMD";
    /// Text sent by the device itself.
    pub const MCU: &str = "MCU";
}

/// An operator-facing log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub category: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(category: &str, message: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            category: category.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    State(TransportState),
    Samples(SampleBatch),
    WriteResult(WriteResult),
    Fault(FaultEvent),
    Log(LogEntry),
}

/// Receiver of session events.
///
/// `publish` is called from the session's reader thread as well as from
/// request-issuing threads, so it must not block for long.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: SessionEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: SessionEvent) {}
}

impl EventSink for mpsc::Sender<SessionEvent> {
    fn publish(&self, event: SessionEvent) {
        // A dropped receiver just means nobody is listening.
        let _ = self.send(event);
    }
}

impl<F> EventSink for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn publish(&self, event: SessionEvent) {
        self(event)
    }
}

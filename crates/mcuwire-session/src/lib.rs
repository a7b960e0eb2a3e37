//! Request/response sessions over a device link.
//!
//! A [`Session`] owns one link. It numbers outgoing requests, keeps a table
//! of the ones awaiting a response, applies per-request timeouts and routes
//! every incoming frame either to its waiting request or, for unsolicited
//! events, to an [`EventSink`].

pub mod config;
pub mod error;
pub mod event;
mod ops;
mod pending;
pub mod session;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use event::{
    category, EventSink, FaultEvent, FaultSeverity, LogEntry, NullSink, SampleBatch, SessionEvent,
    TransportState, WriteResult, FAULT_CMD_FAIL, FAULT_LINK_IO,
};
pub use session::Session;

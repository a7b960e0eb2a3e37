use std::time::Duration;

use mcuwire_frame::command::command_name;
use mcuwire_frame::ErrorCode;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No link is open, or the link has failed.
    #[error("not connected")]
    NotConnected,

    /// No response arrived before the deadline.
    #[error("{} timed out after {timeout:?}", name(.command))]
    Timeout { command: u16, timeout: Duration },

    /// The session was disconnected while the request was in flight.
    #[error("connection closed")]
    Disconnected,

    /// Every sequence number is held by an in-flight request.
    #[error("no free sequence number")]
    SequenceExhausted,

    /// Link-level error.
    #[error("link error: {0}")]
    Link(#[from] mcuwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] mcuwire_frame::FrameError),

    /// The device answered with a non-zero status.
    #[error(
        "{} rejected (status={status} err={error_code} detail={detail:#06x})",
        name(.command)
    )]
    Rejected {
        command: u16,
        status: u8,
        error_code: ErrorCode,
        detail: u16,
    },

    /// The response body could not be decoded.
    #[error("bad response body: {0}")]
    Body(#[from] mcuwire_frame::BodyError),
}

impl From<mcuwire_frame::ValueError> for SessionError {
    fn from(err: mcuwire_frame::ValueError) -> Self {
        SessionError::Body(err.into())
    }
}

fn name(code: &u16) -> &'static str {
    command_name(*code)
}

pub type Result<T> = std::result::Result<T, SessionError>;

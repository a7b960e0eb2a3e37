use crate::body::ErrorCode;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer does not start with the 0x55 0xAA sync marker.
    #[error("missing sync marker (expected 0x55 0xAA)")]
    BadSync,

    /// The buffer is shorter than the frame it declares.
    #[error("truncated frame ({got} bytes, need {need})")]
    Truncated { need: usize, got: usize },

    /// The buffer holds trailing bytes past the declared frame.
    #[error("frame length mismatch (declared {declared} bytes, buffer {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The payload does not fit the link limit or the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The trailing CRC does not match the frame contents.
    #[error("crc mismatch (frame carries {expected:#06x}, computed {actual:#06x})")]
    CrcMismatch { expected: u16, actual: u16 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors from decoding typed payload bodies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BodyError {
    /// The body is shorter than its fixed layout.
    #[error("{what} too short ({got} bytes, need {need})")]
    TooShort {
        what: &'static str,
        need: usize,
        got: usize,
    },

    /// A variable-length record would read past the end of the body.
    #[error("{what} record {index} overruns the body")]
    Overrun { what: &'static str, index: usize },

    /// A declared element count does not account for the body length exactly.
    #[error("{what} length {actual} does not match declared count (expected {expected})")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The frame carries a different command than the decoder handles.
    #[error("unexpected command {0:#06x}")]
    UnexpectedCommand(u16),

    /// The device rejected the request; there is no body to decode.
    #[error("device rejected request (status={status} err={error_code})")]
    Rejected { status: u8, error_code: ErrorCode },

    /// A typed value inside the body could not be decoded.
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Errors from the typed value codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The value-type tag is not one of the known wire types.
    #[error("unknown value type tag {0}")]
    UnknownType(u8),

    /// The byte slice is shorter than the type's wire width.
    #[error("value needs {need} bytes, got {got}")]
    Short { need: usize, got: usize },

    /// Raw values have no numeric representation.
    #[error("raw values cannot be converted to numbers")]
    NotNumeric,

    /// NaN or infinity cannot be stored in an integer type.
    #[error("non-finite value cannot be encoded as an integer")]
    NonFinite,
}

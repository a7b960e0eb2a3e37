//! Typed payload bodies carried inside frames.
//!
//! Every decoder here is total: short or malformed input yields a
//! [`BodyError`], never a partially filled value.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::codec::Frame;
use crate::command;
use crate::error::{BodyError, ValueError};
use crate::value::{decode_value, ValueType};

/// Error code byte carried in every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Ok,
    CrcFail,
    BadLength,
    BadCmd,
    BadParam,
    ForbiddenAddr,
    Internal,
    Unknown(u8),
}

impl ErrorCode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => ErrorCode::Ok,
            0x01 => ErrorCode::CrcFail,
            0x02 => ErrorCode::BadLength,
            0x03 => ErrorCode::BadCmd,
            0x05 => ErrorCode::BadParam,
            0x07 => ErrorCode::ForbiddenAddr,
            0x08 => ErrorCode::Internal,
            other => ErrorCode::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            ErrorCode::Ok => 0x00,
            ErrorCode::CrcFail => 0x01,
            ErrorCode::BadLength => 0x02,
            ErrorCode::BadCmd => 0x03,
            ErrorCode::BadParam => 0x05,
            ErrorCode::ForbiddenAddr => 0x07,
            ErrorCode::Internal => 0x08,
            ErrorCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Unknown(byte) => write!(f, "unknown({byte:#04x})"),
            other => write!(f, "{other:?}({:#04x})", other.as_byte()),
        }
    }
}

/// Decoded response body.
///
/// `status` is authoritative; success is derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u8,
    pub error_code: ErrorCode,
    pub detail: u16,
    pub data: Bytes,
    /// Human-readable failure description; empty on success.
    pub message: String,
}

impl Response {
    /// Minimum body: status, error code, 16-bit detail.
    pub const MIN_LEN: usize = 4;

    /// Decode the body of a response frame.
    pub fn decode(frame: &Frame) -> Result<Self, BodyError> {
        let payload = &frame.payload;
        if payload.len() < Self::MIN_LEN {
            return Err(BodyError::TooShort {
                what: "response",
                need: Self::MIN_LEN,
                got: payload.len(),
            });
        }

        let status = payload[0];
        let error_code = ErrorCode::from_byte(payload[1]);
        let message = if status == 0 {
            String::new()
        } else {
            format!("status={status} err={error_code}")
        };

        Ok(Self {
            status,
            error_code,
            detail: u16::from_le_bytes([payload[2], payload[3]]),
            data: payload.slice(Self::MIN_LEN..),
            message,
        })
    }

    /// A locally synthesised failure (timeouts, closed links).
    pub fn failed(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: 1,
            error_code,
            detail: 0,
            data: Bytes::new(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// The data section of a successful response with at least `need` bytes.
    fn success_data(&self, what: &'static str, need: usize) -> Result<&[u8], BodyError> {
        if !self.is_success() {
            return Err(BodyError::Rejected {
                status: self.status,
                error_code: self.error_code,
            });
        }
        if self.data.len() < need {
            return Err(BodyError::TooShort {
                what,
                need,
                got: self.data.len(),
            });
        }
        Ok(&self.data)
    }
}

bitflags::bitflags! {
    /// Protocol features advertised by the device at handshake.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct Capabilities: u32 {
        const HELLO = 1 << 0;
        const HEARTBEAT = 1 << 1;
        const MOTOR_CONTROL = 1 << 2;
        const READ_TYPED = 1 << 3;
        const WRITE_TYPED = 1 << 4;
        const READ_BLOCK = 1 << 5;
        const WRITE_BLOCK = 1 << 6;
        const EVENT_LOG = 1 << 7;
        const SCOPE = 1 << 8;
    }
}

/// Handshake reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HelloInfo {
    pub protocol_version: u16,
    pub capabilities: Capabilities,
}

impl HelloInfo {
    pub const MIN_LEN: usize = 6;

    pub fn decode(response: &Response) -> Result<Self, BodyError> {
        let data = response.success_data("hello", Self::MIN_LEN)?;
        let raw_caps = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        Ok(Self {
            protocol_version: u16::from_le_bytes([data[0], data[1]]),
            capabilities: Capabilities::from_bits_retain(raw_caps),
        })
    }
}

/// Heartbeat reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartbeatInfo {
    pub loop_tick: u32,
    pub system_mode: u8,
    pub rx_drop: u16,
    pub tx_drop: u16,
}

impl HeartbeatInfo {
    pub const MIN_LEN: usize = 9;

    pub fn decode(response: &Response) -> Result<Self, BodyError> {
        let data = response.success_data("heartbeat", Self::MIN_LEN)?;
        Ok(Self {
            loop_tick: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            system_mode: data[4],
            rx_drop: u16::from_le_bytes([data[5], data[6]]),
            tx_drop: u16::from_le_bytes([data[7], data[8]]),
        })
    }
}

/// One scope channel as described by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeChannelInfo {
    pub id: u8,
    /// Raw value-type tag; see [`ScopeChannelInfo::value_type`].
    pub type_tag: u8,
    pub name: String,
    pub unit: String,
}

impl ScopeChannelInfo {
    pub fn value_type(&self) -> Result<ValueType, ValueError> {
        ValueType::try_from(self.type_tag)
    }
}

/// Decode a scope layout reply: a count byte followed by that many records
/// of `id, type, name_len, name, unit_len, unit`.
pub fn decode_scope_layout(response: &Response) -> Result<Vec<ScopeChannelInfo>, BodyError> {
    let data = response.success_data("scope layout", 1)?;
    let count = data[0] as usize;
    let mut channels = Vec::with_capacity(count);
    let mut cursor = 1usize;

    for index in 0..count {
        let overrun = BodyError::Overrun {
            what: "scope layout",
            index,
        };

        let fixed = data.get(cursor..cursor + 3).ok_or_else(|| overrun.clone())?;
        let (id, type_tag, name_len) = (fixed[0], fixed[1], fixed[2] as usize);
        cursor += 3;

        let name = data
            .get(cursor..cursor + name_len)
            .ok_or_else(|| overrun.clone())?;
        cursor += name_len;

        let unit_len = *data.get(cursor).ok_or_else(|| overrun.clone())? as usize;
        cursor += 1;

        let unit = data.get(cursor..cursor + unit_len).ok_or(overrun)?;
        cursor += unit_len;

        channels.push(ScopeChannelInfo {
            id,
            type_tag,
            name: String::from_utf8_lossy(name).into_owned(),
            unit: String::from_utf8_lossy(unit).into_owned(),
        });
    }

    Ok(channels)
}

/// One streaming scope event: a sample counter and one float per channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeSample {
    pub sequence: u32,
    pub values: Vec<f32>,
}

/// Decode a streaming scope event.
///
/// The declared channel count must account for the payload exactly.
pub fn decode_scope_sample(frame: &Frame) -> Result<ScopeSample, BodyError> {
    const FIXED: usize = 5;

    if frame.command != command::EVENT_SCOPE_DATA {
        return Err(BodyError::UnexpectedCommand(frame.command));
    }
    let payload = &frame.payload;
    if payload.len() < FIXED {
        return Err(BodyError::TooShort {
            what: "scope sample",
            need: FIXED,
            got: payload.len(),
        });
    }

    let count = payload[4] as usize;
    let expected = FIXED + count * 4;
    if payload.len() != expected {
        return Err(BodyError::CountMismatch {
            what: "scope sample",
            expected,
            actual: payload.len(),
        });
    }

    let values = payload[FIXED..]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(ScopeSample {
        sequence: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
        values,
    })
}

/// Scope control reply: the settings the device actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScopeControlReply {
    pub enabled: bool,
    pub period_ms: u16,
    pub channel_count: u8,
}

impl ScopeControlReply {
    pub const MIN_LEN: usize = 4;

    pub fn decode(response: &Response) -> Result<Self, BodyError> {
        let data = response.success_data("scope control", Self::MIN_LEN)?;
        Ok(Self {
            enabled: data[0] != 0,
            period_ms: u16::from_le_bytes([data[1], data[2]]),
            channel_count: data[3],
        })
    }
}

/// Typed read reply: value type, element count, then the value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedReadReply {
    pub type_tag: u8,
    pub count: u16,
    pub value: Bytes,
}

impl TypedReadReply {
    pub const MIN_LEN: usize = 3;

    pub fn decode(response: &Response) -> Result<Self, BodyError> {
        response.success_data("typed read", Self::MIN_LEN)?;
        let data = &response.data;
        Ok(Self {
            type_tag: data[0],
            count: u16::from_le_bytes([data[1], data[2]]),
            value: data.slice(Self::MIN_LEN..),
        })
    }

    /// The single value this reply carries, widened to `f64`.
    pub fn single_number(&self) -> Result<f64, BodyError> {
        if self.count != 1 {
            return Err(BodyError::CountMismatch {
                what: "typed read",
                expected: 1,
                actual: self.count as usize,
            });
        }
        let ty = ValueType::try_from(self.type_tag)?;
        Ok(decode_value(ty, &self.value)?)
    }
}

//! Binary framing for host-to-microcontroller serial links.
//!
//! Wire format (all multi-byte fields little-endian):
//!
//! ```text
//! 0x55 0xAA | version u8 | kind u8 | seq u16 | cmd u16 | len u16 | payload | crc u16
//! ```
//!
//! The CRC is CRC-16/CCITT-FALSE over everything between the sync marker
//! and the CRC itself.
//!
//! This crate is I/O-free. [`StreamDecoder`] turns arbitrary byte chunks
//! into validated frames; the body decoders in [`body`] interpret payloads;
//! [`value`] converts typed device values to and from `f64`.

pub mod body;
pub mod codec;
pub mod command;
pub mod crc;
pub mod decoder;
pub mod error;
pub mod value;

#[cfg(feature = "async")]
pub mod async_codec;

pub use body::{
    decode_scope_layout, decode_scope_sample, Capabilities, ErrorCode, HeartbeatInfo, HelloInfo,
    Response, ScopeChannelInfo, ScopeControlReply, ScopeSample, TypedReadReply,
};
pub use codec::{
    decode_frame, encode_frame, Frame, FrameKind, CRC_SIZE, DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD,
    HEADER_SIZE, PROTOCOL_VERSION, SYNC,
};
pub use crc::crc16;
pub use decoder::{DecoderConfig, DecoderStats, Frames, StreamDecoder};
pub use error::{BodyError, FrameError, Result, ValueError};
pub use value::{decode_value, encode_value, ValueType};

#[cfg(feature = "async")]
pub use async_codec::McuCodec;

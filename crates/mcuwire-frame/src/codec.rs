use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::crc::crc16;
use crate::error::{FrameError, Result};

/// Sync marker that starts every frame.
pub const SYNC: [u8; 2] = [0x55, 0xAA];

/// Protocol version written by the encoder.
pub const PROTOCOL_VERSION: u8 = 0x02;

/// Sync (2) + version (1) + kind (1) + sequence (2) + command (2) + length (2).
pub const HEADER_SIZE: usize = 10;

/// Trailing CRC field.
pub const CRC_SIZE: usize = 2;

/// Bytes a frame occupies beyond its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CRC_SIZE;

/// Default maximum payload accepted from the link.
pub const DEFAULT_MAX_PAYLOAD: usize = 240;

/// Frame kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Request,
    Response,
    Event,
    /// A CRC-valid frame whose kind byte is not recognised.
    Unknown(u8),
}

impl FrameKind {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => FrameKind::Request,
            0x02 => FrameKind::Response,
            0x03 => FrameKind::Event,
            other => FrameKind::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            FrameKind::Request => 0x01,
            FrameKind::Response => 0x02,
            FrameKind::Event => 0x03,
            FrameKind::Unknown(other) => other,
        }
    }
}

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version byte as carried on the wire.
    pub version: u8,
    /// Request, response or event.
    pub kind: FrameKind,
    /// Correlates a request with its response. Events carry 0.
    pub sequence: u16,
    /// Command code (see [`crate::command`]).
    pub command: u16,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame stamped with the current protocol version.
    pub fn new(kind: FrameKind, sequence: u16, command: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            sequence,
            command,
            payload: payload.into(),
        }
    }

    /// Create an unsolicited event frame (sequence 0).
    pub fn event(command: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Event, 0, command, payload)
    }

    /// The total wire size of this frame (header + payload + crc).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode this frame, preserving its version byte.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        put_frame(
            self.version,
            self.kind,
            self.sequence,
            self.command,
            &self.payload,
            dst,
        )
    }

    /// Encode this frame into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (all integers little-endian):
/// ```text
/// ┌───────────┬─────┬──────┬─────┬─────┬─────┬───────────┬─────────┐
/// │ 0x55 0xAA │ ver │ kind │ seq │ cmd │ len │ payload   │ crc16   │
/// │ 2B        │ 1B  │ 1B   │ 2B  │ 2B  │ 2B  │ len bytes │ 2B      │
/// └───────────┴─────┴──────┴─────┴─────┴─────┴───────────┴─────────┘
///              └──────────── crc covers ───────────────┘
/// ```
///
/// The link's negotiated maximum is not enforced here; only payloads that
/// cannot be described by the 16-bit length field are rejected.
pub fn encode_frame(
    kind: FrameKind,
    sequence: u16,
    command: u16,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    put_frame(PROTOCOL_VERSION, kind, sequence, command, payload, dst)
}

fn put_frame(
    version: u8,
    kind: FrameKind,
    sequence: u16,
    command: u16,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u16::MAX as usize,
        });
    }

    dst.reserve(FRAME_OVERHEAD + payload.len());
    let start = dst.len();
    dst.put_slice(&SYNC);
    dst.put_u8(version);
    dst.put_u8(kind.as_byte());
    dst.put_u16_le(sequence);
    dst.put_u16_le(command);
    dst.put_u16_le(payload.len() as u16);
    dst.put_slice(payload);
    let crc = crc16(&dst[start + SYNC.len()..]);
    dst.put_u16_le(crc);
    Ok(())
}

/// Fixed header fields, read from a buffer that starts at the sync marker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawHeader {
    pub version: u8,
    pub kind: FrameKind,
    pub sequence: u16,
    pub command: u16,
    pub payload_len: usize,
}

impl RawHeader {
    /// Caller guarantees `buf.len() >= HEADER_SIZE`.
    pub fn read(buf: &[u8]) -> Self {
        Self {
            version: buf[2],
            kind: FrameKind::from_byte(buf[3]),
            sequence: u16::from_le_bytes([buf[4], buf[5]]),
            command: u16::from_le_bytes([buf[6], buf[7]]),
            payload_len: u16::from_le_bytes([buf[8], buf[9]]) as usize,
        }
    }

    pub fn frame_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload_len
    }

    /// Returns (carried, computed) CRC. Caller guarantees the full frame is present.
    pub fn crc_pair(&self, buf: &[u8]) -> (u16, u16) {
        let end = HEADER_SIZE + self.payload_len;
        let carried = u16::from_le_bytes([buf[end], buf[end + 1]]);
        (carried, crc16(&buf[SYNC.len()..end]))
    }

    pub fn into_frame(self, payload: Bytes) -> Frame {
        Frame {
            version: self.version,
            kind: self.kind,
            sequence: self.sequence,
            command: self.command,
            payload,
        }
    }
}

/// Decode exactly one frame occupying all of `src`.
///
/// This is a strict check with no resynchronisation; byte streams from a
/// link go through [`crate::StreamDecoder`] instead.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < FRAME_OVERHEAD {
        return Err(FrameError::Truncated {
            need: FRAME_OVERHEAD,
            got: src.len(),
        });
    }
    if src[..2] != SYNC {
        return Err(FrameError::BadSync);
    }

    let header = RawHeader::read(src);
    let total = header.frame_len();
    if src.len() < total {
        return Err(FrameError::Truncated {
            need: total,
            got: src.len(),
        });
    }
    if src.len() > total {
        return Err(FrameError::LengthMismatch {
            declared: total,
            actual: src.len(),
        });
    }

    let (carried, computed) = header.crc_pair(src);
    if carried != computed {
        return Err(FrameError::CrcMismatch {
            expected: carried,
            actual: computed,
        });
    }

    let payload = Bytes::copy_from_slice(&src[HEADER_SIZE..HEADER_SIZE + header.payload_len]);
    Ok(header.into_frame(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command;

    #[test]
    fn encode_layout() {
        let mut buf = BytesMut::new();
        encode_frame(
            FrameKind::Request,
            0x1234,
            command::READ_TYPED,
            &[0xAB, 0xCD],
            &mut buf,
        )
        .unwrap();

        assert_eq!(buf.len(), FRAME_OVERHEAD + 2);
        assert_eq!(&buf[..2], &SYNC);
        assert_eq!(buf[2], PROTOCOL_VERSION);
        assert_eq!(buf[3], 0x01);
        assert_eq!(&buf[4..6], &[0x34, 0x12]);
        assert_eq!(&buf[6..8], &[0x00, 0x03]);
        assert_eq!(&buf[8..10], &[0x02, 0x00]);
        assert_eq!(&buf[10..12], &[0xAB, 0xCD]);

        let crc = crc16(&buf[2..12]);
        assert_eq!(&buf[12..14], &crc.to_le_bytes());
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Response, 7, command::HELLO, b"hello", &mut buf).unwrap();

        let frame = decode_frame(&buf).unwrap();
        assert_eq!(frame.version, PROTOCOL_VERSION);
        assert_eq!(frame.kind, FrameKind::Response);
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.command, command::HELLO);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn empty_payload() {
        let frame = Frame::event(command::EVENT_LOG_TEXT, Bytes::new());
        let wire = frame.to_bytes().unwrap();
        assert_eq!(wire.len(), FRAME_OVERHEAD);
        assert_eq!(decode_frame(&wire).unwrap(), frame);
    }

    #[test]
    fn frame_encode_preserves_version_and_unknown_kind() {
        let frame = Frame {
            version: 0x09,
            kind: FrameKind::Unknown(0x7F),
            sequence: 3,
            command: 0x0042,
            payload: Bytes::from_static(b"x"),
        };
        let wire = frame.to_bytes().unwrap();
        assert_eq!(decode_frame(&wire).unwrap(), frame);
    }

    #[test]
    fn decode_rejects_bad_sync() {
        let mut wire = Frame::event(1, Bytes::new()).to_bytes().unwrap().to_vec();
        wire[1] = 0xAB;
        assert!(matches!(decode_frame(&wire), Err(FrameError::BadSync)));
    }

    #[test]
    fn decode_rejects_truncated_and_trailing() {
        let wire = Frame::event(1, Bytes::from_static(b"abc"))
            .to_bytes()
            .unwrap()
            .to_vec();

        assert!(matches!(
            decode_frame(&wire[..wire.len() - 1]),
            Err(FrameError::Truncated { .. })
        ));

        let mut longer = wire.clone();
        longer.push(0);
        assert!(matches!(
            decode_frame(&longer),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn any_single_bit_flip_fails_decode() {
        let wire = Frame::new(FrameKind::Request, 9, command::HEARTBEAT, vec![1, 2, 3])
            .to_bytes()
            .unwrap()
            .to_vec();

        for byte in 0..wire.len() {
            for bit in 0..8 {
                let mut flipped = wire.clone();
                flipped[byte] ^= 1 << bit;
                assert!(
                    decode_frame(&flipped).is_err(),
                    "flip at byte {byte} bit {bit} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn encode_rejects_unrepresentable_length() {
        let payload = vec![0u8; u16::MAX as usize + 1];
        let mut buf = BytesMut::new();
        let err = encode_frame(FrameKind::Request, 1, 1, &payload, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_appends_to_existing_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Event, 0, 1, b"a", &mut buf).unwrap();
        let first = buf.len();
        encode_frame(FrameKind::Event, 0, 2, b"b", &mut buf).unwrap();

        assert_eq!(decode_frame(&buf[..first]).unwrap().command, 1);
        assert_eq!(decode_frame(&buf[first..]).unwrap().command, 2);
    }

    #[test]
    fn kind_bytes() {
        for byte in 0..=u8::MAX {
            assert_eq!(FrameKind::from_byte(byte).as_byte(), byte);
        }
        assert_eq!(FrameKind::from_byte(3), FrameKind::Event);
    }
}

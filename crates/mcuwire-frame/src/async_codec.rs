//! `tokio_util::codec` adapter over the same resynchronising decoder.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::codec::Frame;
use crate::decoder::{extract_frame, DecoderConfig, DecoderStats};
use crate::error::FrameError;

/// Frame codec for `FramedRead`/`FramedWrite` over async byte streams.
///
/// Decoding behaves exactly like [`crate::StreamDecoder`]: noise and
/// corrupted frames are skipped, never reported.
#[derive(Debug, Default)]
pub struct McuCodec {
    config: DecoderConfig,
    stats: DecoderStats,
}

impl McuCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            config,
            stats: DecoderStats::default(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }
}

impl Decoder for McuCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        Ok(extract_frame(src, self.config.max_payload, &mut self.stats))
    }

    /// Leftover noise or a truncated frame at end of stream is discarded.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = extract_frame(src, self.config.max_payload, &mut self.stats) {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            trace!(dropped = src.len(), "discarding partial data at end of stream");
            self.stats.discarded_bytes += src.len() as u64;
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<Frame> for McuCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode(dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::FrameKind;
    use crate::command;

    #[tokio::test]
    async fn reads_frames_through_noise() {
        let first = Frame::new(FrameKind::Response, 1, command::HELLO, vec![0, 0, 0, 0]);
        let second = Frame::event(command::EVENT_LOG_TEXT, b"boot".to_vec());

        let mut wire = vec![0x00, 0x55, 0x13];
        wire.extend_from_slice(&first.to_bytes().unwrap());
        wire.extend_from_slice(&[0xFF, 0xFE]);
        wire.extend_from_slice(&second.to_bytes().unwrap());

        let mut reader = FramedRead::new(wire.as_slice(), McuCodec::new());
        assert_eq!(reader.next().await.unwrap().unwrap(), first);
        assert_eq!(reader.next().await.unwrap().unwrap(), second);
        assert!(reader.next().await.is_none());
        assert_eq!(reader.decoder().stats().frames, 2);
    }

    #[tokio::test]
    async fn trailing_garbage_ends_stream_cleanly() {
        let frame = Frame::new(FrameKind::Response, 4, command::HEARTBEAT, vec![0, 0, 0, 0]);
        let mut wire = frame.to_bytes().unwrap().to_vec();
        wire.extend_from_slice(&[1, 2, 3]);

        let mut reader = FramedRead::new(wire.as_slice(), McuCodec::new());
        assert_eq!(reader.next().await.unwrap().unwrap(), frame);
        assert!(reader.next().await.is_none());
        assert_eq!(reader.decoder().stats().discarded_bytes, 3);
    }

    #[tokio::test]
    async fn truncated_frame_at_end_is_dropped() {
        let frame = Frame::new(FrameKind::Response, 5, command::HELLO, vec![0; 8]);
        let bytes = frame.to_bytes().unwrap();
        let cut = &bytes[..bytes.len() - 2];

        let mut reader = FramedRead::new(cut, McuCodec::new());
        assert!(reader.next().await.is_none());
        assert_eq!(reader.decoder().stats().frames, 0);
        assert_eq!(reader.decoder().stats().discarded_bytes, cut.len() as u64);
    }

    #[tokio::test]
    async fn writes_encoded_frames() {
        let frame = Frame::new(FrameKind::Request, 9, command::HEARTBEAT, Vec::new());
        let mut writer = FramedWrite::new(Vec::new(), McuCodec::new());
        writer.send(frame.clone()).await.unwrap();

        let written = writer.into_inner();
        assert_eq!(written, frame.to_bytes().unwrap().to_vec());
    }
}

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{Frame, RawHeader, DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD, HEADER_SIZE, SYNC};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Configuration for the stream decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Largest payload length accepted from a header. Larger values are
    /// treated as corruption. Default: 240.
    pub max_payload: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Counters describing what the decoder has dropped while resynchronising.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames yielded.
    pub frames: u64,
    /// Bytes thrown away while hunting for a valid frame.
    pub discarded_bytes: u64,
    /// Candidate frames rejected by CRC.
    pub crc_failures: u64,
    /// Candidate headers rejected for an oversized length field.
    pub oversize_headers: u64,
}

/// Incremental frame assembler for a noisy byte stream.
///
/// Bytes arrive in arbitrary chunks; complete CRC-valid frames come out.
/// Noise, truncation and corruption are absorbed by resynchronising on the
/// sync marker and never surface as errors.
#[derive(Debug)]
pub struct StreamDecoder {
    buf: BytesMut,
    config: DecoderConfig,
    stats: DecoderStats,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            stats: DecoderStats::default(),
        }
    }

    /// Append `chunk` and iterate over every frame now complete.
    ///
    /// The iterator is lazy. Frames it does not get to yield stay buffered
    /// and are produced by the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(chunk);
        Frames { decoder: self }
    }

    /// Number of bytes held waiting for more data.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial data (e.g. when a link is reopened).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Resynchronisation counters since construction.
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }
}

/// Frames extracted by one [`StreamDecoder::feed`] call.
pub struct Frames<'a> {
    decoder: &'a mut StreamDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let decoder = &mut *self.decoder;
        extract_frame(&mut decoder.buf, decoder.config.max_payload, &mut decoder.stats)
    }
}

/// Pull the next valid frame off the front of `buf`, resynchronising past
/// anything that is not one.
///
/// Returns `None` when more data is needed. On an oversized length only the
/// sync marker is dropped; on a CRC mismatch only one byte is, so a false
/// sync match inside payload data costs a few bytes instead of the next
/// real frame.
pub(crate) fn extract_frame(
    buf: &mut BytesMut,
    max_payload: usize,
    stats: &mut DecoderStats,
) -> Option<Frame> {
    loop {
        if buf.len() < FRAME_OVERHEAD {
            return None;
        }

        let Some(pos) = find_sync(buf) else {
            trace!(dropped = buf.len(), "no sync marker in buffer");
            stats.discarded_bytes += buf.len() as u64;
            buf.clear();
            return None;
        };
        if pos > 0 {
            trace!(dropped = pos, "skipping bytes before sync marker");
            stats.discarded_bytes += pos as u64;
            buf.advance(pos);
        }
        if buf.len() < FRAME_OVERHEAD {
            return None;
        }

        let header = RawHeader::read(buf);
        if header.payload_len > max_payload {
            debug!(
                len = header.payload_len,
                max = max_payload,
                "oversized length field, dropping sync marker"
            );
            stats.oversize_headers += 1;
            stats.discarded_bytes += SYNC.len() as u64;
            buf.advance(SYNC.len());
            continue;
        }

        let total = header.frame_len();
        if buf.len() < total {
            return None;
        }

        let (carried, computed) = header.crc_pair(buf);
        if carried != computed {
            debug!(
                seq = header.sequence,
                command = header.command,
                carried,
                computed,
                "crc mismatch, resyncing"
            );
            stats.crc_failures += 1;
            stats.discarded_bytes += 1;
            buf.advance(1);
            continue;
        }

        let mut raw = buf.split_to(total);
        raw.advance(HEADER_SIZE);
        raw.truncate(header.payload_len);
        stats.frames += 1;
        return Some(header.into_frame(raw.freeze()));
    }
}

fn find_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(SYNC.len()).position(|window| window == SYNC)
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, Bytes};
    use proptest::prelude::*;

    use super::*;
    use crate::codec::{encode_frame, FrameKind};
    use crate::command;

    fn wire(kind: FrameKind, seq: u16, cmd: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(kind, seq, cmd, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn single_frame() {
        let mut decoder = StreamDecoder::new();
        let frames: Vec<_> = decoder
            .feed(&wire(FrameKind::Response, 5, command::HELLO, b"ok"))
            .collect();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 5);
        assert_eq!(frames[0].payload.as_ref(), b"ok");
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn byte_by_byte_delivery() {
        let bytes = wire(FrameKind::Event, 0, command::EVENT_LOG_TEXT, b"slow link");
        let mut decoder = StreamDecoder::new();

        let mut frames = Vec::new();
        for byte in &bytes {
            frames.extend(decoder.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"slow link");
    }

    #[test]
    fn back_to_back_frames_in_order() {
        let mut stream = Vec::new();
        for seq in 1..=5u16 {
            stream.extend(wire(FrameKind::Response, seq, command::HEARTBEAT, &[seq as u8]));
        }

        let mut decoder = StreamDecoder::new();
        let seqs: Vec<u16> = decoder.feed(&stream).map(|f| f.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn garbage_prefix_is_skipped() {
        let mut stream = vec![0x00, 0x13, 0xFF, 0xAA, 0x42, 0x07];
        stream.extend(wire(FrameKind::Response, 2, command::HELLO, b"hi"));

        let mut decoder = StreamDecoder::new();
        let frames: Vec<_> = decoder.feed(&stream).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 2);
        assert_eq!(decoder.stats().discarded_bytes, 6);
    }

    #[test]
    fn buffer_without_sync_is_discarded() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(&[0x11; 20]).count(), 0);
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.stats().discarded_bytes, 20);
    }

    #[test]
    fn short_buffer_waits_even_without_sync() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(&[0x11; 5]).count(), 0);
        assert_eq!(decoder.buffered(), 5);
    }

    #[test]
    fn truncated_frame_waits_for_rest() {
        let bytes = wire(FrameKind::Response, 9, command::READ_TYPED, &[1, 2, 3, 4, 5, 6]);
        let (head, tail) = bytes.split_at(14);

        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(head).count(), 0);
        assert_eq!(decoder.buffered(), 14);

        let frames: Vec<_> = decoder.feed(tail).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn corrupted_frame_dropped_next_frame_survives() {
        let mut bad = wire(FrameKind::Response, 1, command::HEARTBEAT, b"payload-one");
        bad[12] ^= 0x40;
        let good = wire(FrameKind::Response, 2, command::HEARTBEAT, b"payload-two");

        let mut stream = bad;
        stream.extend(&good);

        let mut decoder = StreamDecoder::new();
        let frames: Vec<_> = decoder.feed(&stream).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 2);
        assert_eq!(frames[0].payload.as_ref(), b"payload-two");
        assert!(decoder.stats().crc_failures >= 1);
    }

    #[test]
    fn corrupted_crc_field_is_dropped() {
        let mut bad = wire(FrameKind::Event, 0, command::EVENT_LOG_TEXT, b"x");
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        bad.extend(wire(FrameKind::Event, 0, command::EVENT_LOG_TEXT, b"y"));

        let mut decoder = StreamDecoder::new();
        let frames: Vec<_> = decoder.feed(&bad).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"y");
    }

    #[test]
    fn oversized_length_drops_only_sync_marker() {
        let mut stream = BytesMut::new();
        stream.put_slice(&SYNC);
        stream.put_u8(0x02);
        stream.put_u8(0x02);
        stream.put_u16_le(1);
        stream.put_u16_le(command::HELLO);
        stream.put_u16_le(1000);
        stream.put_slice(&[0u8; 4]);

        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(&stream).count(), 0);
        let stats = decoder.stats();
        assert_eq!(stats.oversize_headers, 1);
        // 12 bytes left after dropping the marker, none of them a sync pair.
        assert_eq!(stats.discarded_bytes, 2 + 12);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn oversized_false_header_followed_by_real_frame() {
        let mut stream = vec![0x55, 0xAA, 0x02, 0x02, 0x01, 0x00, 0x01, 0x00, 0xFF, 0xFF];
        stream.extend(wire(FrameKind::Response, 4, command::HELLO, b"real"));

        let mut decoder = StreamDecoder::new();
        let frames: Vec<_> = decoder.feed(&stream).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 4);
        assert_eq!(decoder.stats().oversize_headers, 1);
    }

    #[test]
    fn false_sync_inside_payload_self_corrects() {
        // A payload that itself contains a sync marker. Lose the real marker
        // so the decoder latches onto the false one first.
        let inner = wire(FrameKind::Event, 0, command::EVENT_LOG_TEXT, &[0x55, 0xAA, 0x01, 0x02]);
        let mut stream = inner[2..].to_vec();
        stream.extend(wire(FrameKind::Event, 0, command::EVENT_LOG_TEXT, b"after"));

        let mut decoder = StreamDecoder::new();
        let frames: Vec<_> = decoder.feed(&stream).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"after");
    }

    #[test]
    fn custom_max_payload() {
        let mut decoder = StreamDecoder::with_config(DecoderConfig { max_payload: 4 });
        let big = wire(FrameKind::Response, 1, command::READ_BLOCK, &[0u8; 8]);
        let small = wire(FrameKind::Response, 2, command::READ_BLOCK, &[0u8; 4]);

        let mut stream = big;
        stream.extend(small);
        let seqs: Vec<u16> = decoder.feed(&stream).map(|f| f.sequence).collect();
        assert_eq!(seqs, vec![2]);
    }

    #[test]
    fn partially_consumed_iterator_resumes_on_next_feed() {
        let mut stream = Vec::new();
        for seq in 1..=3u16 {
            stream.extend(wire(FrameKind::Response, seq, command::HELLO, &[]));
        }

        let mut decoder = StreamDecoder::new();
        let first = decoder.feed(&stream).next().unwrap();
        assert_eq!(first.sequence, 1);

        let rest: Vec<u16> = decoder.feed(&[]).map(|f| f.sequence).collect();
        assert_eq!(rest, vec![2, 3]);
        assert_eq!(decoder.stats().frames, 3);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let bytes = wire(FrameKind::Response, 1, command::HELLO, b"abc");
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(&bytes[..13]).count(), 0);
        decoder.reset();
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.feed(&bytes).count(), 1);
    }

    fn arb_frame() -> impl Strategy<Value = (u8, u16, u16, Vec<u8>)> {
        (
            1u8..=3,
            any::<u16>(),
            any::<u16>(),
            proptest::collection::vec(any::<u8>(), 0..=DEFAULT_MAX_PAYLOAD),
        )
    }

    proptest! {
        #[test]
        fn roundtrip_through_arbitrary_chunking(
            frames in proptest::collection::vec(arb_frame(), 1..6),
            chunk in 1usize..64,
        ) {
            let mut stream = Vec::new();
            for (kind, seq, cmd, payload) in &frames {
                stream.extend(wire(FrameKind::from_byte(*kind), *seq, *cmd, payload));
            }

            let mut decoder = StreamDecoder::new();
            let mut out = Vec::new();
            for piece in stream.chunks(chunk) {
                out.extend(decoder.feed(piece));
            }

            prop_assert_eq!(out.len(), frames.len());
            for (frame, (kind, seq, cmd, payload)) in out.iter().zip(&frames) {
                prop_assert_eq!(frame.kind.as_byte(), *kind);
                prop_assert_eq!(frame.sequence, *seq);
                prop_assert_eq!(frame.command, *cmd);
                prop_assert_eq!(&frame.payload, &Bytes::from(payload.clone()));
            }
        }

        #[test]
        fn garbage_without_marker_bytes_is_absorbed(
            garbage in proptest::collection::vec(any::<u8>().prop_filter("no 0x55", |b| *b != 0x55), 0..100),
            (kind, seq, cmd, payload) in arb_frame(),
        ) {
            let mut stream = garbage.clone();
            stream.extend(wire(FrameKind::from_byte(kind), seq, cmd, &payload));

            let mut decoder = StreamDecoder::new();
            let out: Vec<_> = decoder.feed(&stream).collect();
            prop_assert_eq!(out.len(), 1);
            prop_assert_eq!(out[0].sequence, seq);
            prop_assert_eq!(decoder.buffered(), 0);
        }
    }
}

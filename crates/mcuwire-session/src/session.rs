use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use bytes::BytesMut;
use mcuwire_frame::command::{self, command_name};
use mcuwire_frame::{
    decode_scope_sample, encode_frame, DecoderConfig, ErrorCode, Frame, FrameError, FrameKind,
    Response, StreamDecoder,
};
use mcuwire_transport::{open_serial, LinkStream, SerialSettings, TransportError};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::event::{
    category, EventSink, FaultEvent, FaultSeverity, LogEntry, SampleBatch, SessionEvent,
    TransportState, FAULT_LINK_IO,
};
use crate::pending::{lock, Outcome, PendingTable};

/// Floor for the streaming window length when estimating sample rate.
const MIN_RATE_WINDOW_SECS: f64 = 0.001;

/// A request/response session over one device link.
///
/// Requests may be issued from any number of threads at once; each waits
/// only for its own response. Incoming frames are read and dispatched by a
/// dedicated reader thread started on connect.
pub struct Session {
    shared: Arc<Shared>,
    writer: Mutex<Option<Writer>>,
    reader: Mutex<Option<Reader>>,
}

/// State reachable from both the request path and the reader thread.
struct Shared {
    config: SessionConfig,
    sink: Arc<dyn EventSink>,
    pending: PendingTable,
    state: Mutex<TransportState>,
    streaming: AtomicBool,
    window: Mutex<StreamWindow>,
}

/// Outbound half of the link. The lock around it orders sequence
/// allocation and wire writes together.
struct Writer {
    link: LinkStream,
    next_seq: u16,
    buf: BytesMut,
}

struct Reader {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

struct StreamWindow {
    started: Instant,
    events: u64,
}

impl StreamWindow {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            events: 0,
        }
    }
}

impl Session {
    /// Create an idle session publishing to `sink`.
    pub fn new(config: SessionConfig, sink: impl EventSink + 'static) -> Self {
        Self::with_sink(config, Arc::new(sink))
    }

    /// Create an idle session publishing to a shared sink.
    pub fn with_sink(config: SessionConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                sink,
                pending: PendingTable::default(),
                state: Mutex::new(TransportState::Idle),
                streaming: AtomicBool::new(false),
                window: Mutex::new(StreamWindow::new()),
            }),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Open a serial port and start the session on it.
    ///
    /// An existing connection is closed first.
    pub fn connect(&self, port: &str, settings: &SerialSettings) -> Result<()> {
        self.disconnect();
        self.shared.set_state(TransportState::Connecting);

        let link = match open_serial(port, settings) {
            Ok(link) => link,
            Err(err) => {
                self.shared.log(category::LINK, format!("Open failed: {err}"));
                self.shared.set_state(TransportState::Error);
                return Err(err.into());
            }
        };

        self.start(link)?;
        self.shared.log(
            category::LINK,
            format!("Connected {port} @ {}", settings.baud_rate),
        );
        Ok(())
    }

    /// Start the session on an already open link.
    pub fn connect_link(&self, link: LinkStream) -> Result<()> {
        self.disconnect();
        self.shared.set_state(TransportState::Connecting);

        let name = link.name();
        self.start(link)?;
        self.shared.log(category::LINK, format!("Connected {name}"));
        Ok(())
    }

    fn start(&self, link: LinkStream) -> Result<()> {
        let spawned = link.try_clone().and_then(|mut inbound| {
            inbound.set_read_timeout(self.shared.config.read_poll_interval)?;
            let stop = Arc::new(AtomicBool::new(false));
            let thread = {
                let shared = Arc::clone(&self.shared);
                let stop = Arc::clone(&stop);
                thread::Builder::new()
                    .name("mcuwire-reader".to_string())
                    .spawn(move || read_loop(shared, inbound, stop))?
            };
            Ok(Reader { stop, thread })
        });

        let reader = match spawned {
            Ok(reader) => reader,
            Err(err) => {
                self.shared.log(category::LINK, format!("Open failed: {err}"));
                self.shared.set_state(TransportState::Error);
                return Err(err.into());
            }
        };

        self.shared.streaming.store(false, Ordering::Release);
        *lock(&self.shared.window) = StreamWindow::new();
        *lock(&self.writer) = Some(Writer {
            link,
            next_seq: 1,
            buf: BytesMut::with_capacity(256),
        });
        *lock(&self.reader) = Some(reader);
        self.shared.set_state(TransportState::Connected);
        Ok(())
    }

    /// Close the link and fail every in-flight request.
    ///
    /// Returns once the reader thread has exited. Safe to call when not
    /// connected.
    pub fn disconnect(&self) {
        let writer = lock(&self.writer).take();
        let reader = lock(&self.reader).take();
        let had_link = writer.is_some() || reader.is_some();

        if self.shared.streaming.swap(false, Ordering::AcqRel) {
            self.shared.log(category::PROTO, "Streaming stopped");
        }
        if let Some(reader) = &reader {
            reader.stop.store(true, Ordering::Release);
        }
        if let Some(writer) = writer {
            writer.link.shutdown();
        }
        if let Some(reader) = reader {
            if reader.thread.thread().id() != thread::current().id()
                && reader.thread.join().is_err()
            {
                warn!("reader thread panicked");
            }
        }

        let drained = self.shared.pending.drain(|| SessionError::Disconnected);
        if drained > 0 {
            debug!(drained, "failed pending requests on disconnect");
        }
        self.shared.set_state(TransportState::Idle);
        if had_link {
            self.shared.log(category::LINK, "Disconnected");
        }
    }

    /// Send a request and wait for its response.
    ///
    /// A non-zero device status is still `Ok`; inspect
    /// [`Response::is_success`].
    ///
    /// Failures other than [`SessionError::NotConnected`] are also published
    /// as `PROTO` log entries.
    pub fn exchange(&self, command: u16, payload: &[u8], timeout: Duration) -> Result<Response> {
        let result = self.transact(command, payload, timeout);
        match &result {
            Err(SessionError::NotConnected) | Ok(_) => {}
            Err(SessionError::Timeout { .. }) => {
                self.shared
                    .log(category::PROTO, format!("cmd {command:#06X} timeout"));
            }
            Err(err) => {
                self.shared.log(
                    category::PROTO,
                    format!("Request failed cmd={command:#06X}: {err}"),
                );
            }
        }
        result
    }

    fn transact(&self, command: u16, payload: &[u8], timeout: Duration) -> Result<Response> {
        let max = self.shared.config.max_payload;
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            }
            .into());
        }

        let (seq, rx) = {
            let mut guard = lock(&self.writer);
            let writer = match guard.as_mut() {
                Some(writer) if self.shared.state().is_connected() => writer,
                _ => return Err(SessionError::NotConnected),
            };

            let (seq, rx) = writer.allocate(&self.shared.pending)?;
            writer.buf.clear();
            if let Err(err) = encode_frame(FrameKind::Request, seq, command, payload, &mut writer.buf)
            {
                self.shared.pending.cancel(seq);
                return Err(err.into());
            }
            if let Err(err) = writer.send() {
                self.shared.pending.cancel(seq);
                drop(guard);
                self.shared.link_failed(&format!("write failed: {err}"));
                return Err(TransportError::from(err).into());
            }
            trace!(
                seq,
                command = command_name(command),
                len = payload.len(),
                "request sent"
            );
            (seq, rx)
        };

        let outcome = match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                if self.shared.pending.cancel(seq) {
                    warn!(seq, command = command_name(command), ?timeout, "request timed out");
                    Err(SessionError::Timeout { command, timeout })
                } else {
                    // The dispatcher removed the entry first; its result is on the way.
                    rx.recv().unwrap_or(Err(SessionError::Disconnected))
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::Disconnected),
        };

        outcome.map(|mut rsp| {
            if !rsp.is_success() {
                rsp.message = format!(
                    "cmd={command:#06X} {} detail={:#06X}",
                    rsp.message, rsp.detail
                );
            }
            rsp
        })
    }

    /// Like [`Session::exchange`], but every failure is folded into a failed
    /// [`Response`] carrying [`ErrorCode::Internal`].
    pub fn request(&self, command: u16, payload: &[u8], timeout: Duration) -> Response {
        match self.exchange(command, payload, timeout) {
            Ok(rsp) => rsp,
            Err(err) => Response::failed(
                ErrorCode::Internal,
                format!("{} failed: {err}", command_name(command)),
            ),
        }
    }

    /// Exchange a request and require a successful status.
    pub(crate) fn call(&self, command: u16, payload: &[u8], timeout: Duration) -> Result<Response> {
        let rsp = self.exchange(command, payload, timeout)?;
        if !rsp.is_success() {
            return Err(SessionError::Rejected {
                command,
                status: rsp.status,
                error_code: rsp.error_code,
                detail: rsp.detail,
            });
        }
        Ok(rsp)
    }

    /// Begin publishing sample batches from scope events.
    ///
    /// This does not touch the device; enable its sampler with
    /// [`Session::scope_control`].
    pub fn start_streaming(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        *lock(&self.shared.window) = StreamWindow::new();
        self.shared.streaming.store(true, Ordering::Release);
        self.shared.set_state(TransportState::Streaming);
        self.shared.log(category::PROTO, "Streaming started");
        Ok(())
    }

    /// Stop publishing sample batches. Scope events are dropped from now on.
    pub fn stop_streaming(&self) {
        if !self.shared.streaming.swap(false, Ordering::AcqRel) {
            return;
        }
        {
            let mut state = lock(&self.shared.state);
            if *state == TransportState::Streaming {
                *state = TransportState::Connected;
                drop(state);
                self.shared
                    .publish(SessionEvent::State(TransportState::Connected));
            }
        }
        self.shared.log(category::PROTO, "Streaming stopped");
    }

    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state().is_connected()
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.streaming.load(Ordering::Acquire)
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        self.shared.publish(event);
    }

    pub(crate) fn log(&self, category: &str, message: impl Into<String>) {
        self.shared.log(category, message);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("streaming", &self.is_streaming())
            .field("pending", &self.pending_requests())
            .finish()
    }
}

impl Writer {
    /// Claim the next free sequence number and register it.
    fn allocate(
        &mut self,
        pending: &PendingTable,
    ) -> Result<(u16, Receiver<Outcome>)> {
        for _ in 0..u16::MAX {
            let seq = self.next_seq;
            self.next_seq = next_sequence(seq);
            if let Some(rx) = pending.register(seq) {
                return Ok((seq, rx));
            }
        }
        Err(SessionError::SequenceExhausted)
    }

    fn send(&mut self) -> io::Result<()> {
        self.link.write_all(&self.buf)?;
        self.link.flush()
    }
}

/// Sequence numbers run 1..=0xFFFF and wrap back to 1. Zero is left for
/// unsolicited frames.
fn next_sequence(seq: u16) -> u16 {
    if seq == u16::MAX {
        1
    } else {
        seq + 1
    }
}

impl Shared {
    fn state(&self) -> TransportState {
        *lock(&self.state)
    }

    fn set_state(&self, next: TransportState) {
        let changed = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut *state, next) != next
        };
        if changed {
            info!(state = %next, "transport state changed");
            self.publish(SessionEvent::State(next));
        }
    }

    fn publish(&self, event: SessionEvent) {
        self.sink.publish(event);
    }

    fn log(&self, category: &str, message: impl Into<String>) {
        let entry = LogEntry::new(category, message);
        debug!(category, message = %entry.message, "session log");
        self.publish(SessionEvent::Log(entry));
    }

    fn fault(&self, severity: FaultSeverity, code: &str, message: String, context: String) {
        self.publish(SessionEvent::Fault(FaultEvent {
            timestamp: SystemTime::now(),
            severity,
            code: code.to_string(),
            message,
            context,
        }));
    }

    /// The link is unusable: report it and fail everything waiting on it.
    fn link_failed(&self, reason: &str) {
        warn!(reason, "link failed");
        self.streaming.store(false, Ordering::Release);
        self.log(category::LINK, format!("Link error: {reason}"));
        self.fault(
            FaultSeverity::Critical,
            FAULT_LINK_IO,
            reason.to_string(),
            "transport".to_string(),
        );
        self.set_state(TransportState::Error);
        self.pending.drain(|| SessionError::Disconnected);
    }

    fn dispatch(&self, frame: Frame) {
        match frame.kind {
            FrameKind::Response => self.dispatch_response(frame),
            FrameKind::Event => self.dispatch_event(frame),
            kind => debug!(?kind, command = frame.command, "ignoring frame"),
        }
    }

    fn dispatch_response(&self, frame: Frame) {
        let seq = frame.sequence;
        let outcome = Response::decode(&frame).map_err(SessionError::from);
        if !self.pending.resolve(seq, outcome) {
            debug!(
                seq,
                command = command_name(frame.command),
                "dropping unmatched response"
            );
        }
    }

    fn dispatch_event(&self, frame: Frame) {
        match frame.command {
            command::EVENT_LOG_TEXT => {
                let text = String::from_utf8_lossy(&frame.payload).into_owned();
                self.log(category::MCU, text);
            }
            command::EVENT_SCOPE_DATA => {
                if !self.streaming.load(Ordering::Acquire) {
                    trace!("scope event while not streaming");
                    return;
                }
                let sample = match decode_scope_sample(&frame) {
                    Ok(sample) => sample,
                    Err(err) => {
                        debug!(%err, "dropping malformed scope event");
                        return;
                    }
                };

                let sample_rate_hz = {
                    let mut window = lock(&self.window);
                    window.events += 1;
                    let elapsed = window
                        .started
                        .elapsed()
                        .as_secs_f64()
                        .max(MIN_RATE_WINDOW_SECS);
                    window.events as f64 / elapsed
                };

                self.publish(SessionEvent::Samples(SampleBatch {
                    timestamp: SystemTime::now(),
                    channels: sample.values.iter().map(|&v| vec![v as f64]).collect(),
                    sample_rate_hz,
                    source_sequence: sample.sequence,
                }));
            }
            other => debug!(command = other, "ignoring unknown event"),
        }
    }
}

fn read_loop(shared: Arc<Shared>, mut link: LinkStream, stop: Arc<AtomicBool>) {
    let mut decoder = StreamDecoder::with_config(DecoderConfig {
        max_payload: shared.config.max_payload,
    });
    let mut chunk = vec![0u8; shared.config.read_chunk_size.max(1)];

    while !stop.load(Ordering::Acquire) {
        match link.read(&mut chunk) {
            Ok(0) => {
                if !stop.load(Ordering::Acquire) {
                    shared.link_failed("link closed by peer");
                }
                break;
            }
            Ok(n) => {
                for frame in decoder.feed(&chunk[..n]) {
                    shared.dispatch(frame);
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(err) => {
                if !stop.load(Ordering::Acquire) {
                    shared.link_failed(&format!("read failed: {err}"));
                }
                break;
            }
        }
    }

    let stats = decoder.stats();
    debug!(
        frames = stats.frames,
        discarded = stats.discarded_bytes,
        crc_failures = stats.crc_failures,
        "reader stopped"
    );
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use mcuwire_session::{SampleBatch, Session, SessionEvent, TransportState};
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, open_session, ScopeArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::logging::log_session_event;
use crate::output::{print_json, unix_seconds, OutputFormat};

const POLL: Duration = Duration::from_millis(100);

#[derive(Serialize)]
struct SampleOutput<'a> {
    timestamp: f64,
    source_sequence: u32,
    sample_rate_hz: f64,
    channels: &'a [String],
    values: Vec<f64>,
}

pub fn run(args: ScopeArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel();
    let session = open_session(&args.device, tx)?;
    let result = stream(&session, &rx, &args, &running, format);

    if session.is_connected() {
        if let Err(err) = session.scope_control(false, args.period_ms) {
            warn!(%err, "failed to disable device scope");
        }
    }
    session.stop_streaming();
    session.disconnect();
    for event in rx.try_iter() {
        log_session_event(&event);
    }
    result
}

fn stream(
    session: &Session,
    rx: &Receiver<SessionEvent>,
    args: &ScopeArgs,
    running: &AtomicBool,
    format: OutputFormat,
) -> CliResult<i32> {
    let layout = session
        .scope_layout()
        .map_err(|err| session_error("scope layout failed", err))?;
    for channel in &layout {
        info!(id = channel.id, name = %channel.name, unit = %channel.unit, "scope channel");
    }
    let names: Vec<String> = layout.iter().map(|c| c.name.clone()).collect();

    let applied = session
        .scope_control(true, args.period_ms)
        .map_err(|err| session_error("scope enable failed", err))?;
    info!(
        period_ms = applied.period_ms,
        channels = applied.channel_count,
        "device scope enabled"
    );
    session
        .start_streaming()
        .map_err(|err| session_error("streaming failed", err))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.batches.is_some_and(|limit| printed >= limit) {
            break;
        }
        match rx.recv_timeout(POLL) {
            Ok(SessionEvent::Samples(batch)) => {
                print_batch(&batch, &names, format);
                printed += 1;
            }
            Ok(event) => {
                log_session_event(&event);
                if event == SessionEvent::State(TransportState::Error) {
                    return Err(CliError::new(TRANSPORT_ERROR, "link lost while streaming"));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(SUCCESS)
}

fn print_batch(batch: &SampleBatch, names: &[String], format: OutputFormat) {
    let values: Vec<f64> = batch
        .channels
        .iter()
        .filter_map(|samples| samples.first().copied())
        .collect();

    match format {
        OutputFormat::Json => print_json(&SampleOutput {
            timestamp: unix_seconds(batch.timestamp),
            source_sequence: batch.source_sequence,
            sample_rate_hz: batch.sample_rate_hz,
            channels: names,
            values,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "seq={} rate={:.1}Hz {}",
                batch.source_sequence,
                batch.sample_rate_hz,
                format_values(names, &values)
            );
        }
    }
}

/// `name=value` pairs; channels beyond the layout are numbered.
fn format_values(names: &[String], values: &[f64]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| match names.get(i) {
            Some(name) => format!("{name}={v}"),
            None => format!("ch{i}={v}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

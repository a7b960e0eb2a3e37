use std::sync::mpsc;

use mcuwire_session::{SessionEvent, WriteResult};
use serde::Serialize;

use crate::cmd::{open_session, WriteArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::logging::log_session_event;
use crate::output::{print_record, unix_seconds, OutputFormat};

#[derive(Serialize)]
struct WriteOutput {
    target: String,
    success: bool,
    detail: String,
    timestamp: f64,
}

impl From<WriteResult> for WriteOutput {
    fn from(result: WriteResult) -> Self {
        Self {
            target: result.target,
            success: result.success,
            detail: result.detail,
            timestamp: unix_seconds(result.timestamp),
        }
    }
}

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    let (tx, rx) = mpsc::channel();
    let session = open_session(&args.device, tx)?;
    let outcome = session.write_typed(args.address, args.value_type, args.value);
    session.disconnect();
    drop(session);

    for event in rx.try_iter() {
        log_session_event(&event);
        if let SessionEvent::WriteResult(result) = event {
            let out = WriteOutput::from(result);
            let fields = [
                ("Target", out.target.clone()),
                ("Success", out.success.to_string()),
                ("Detail", out.detail.clone()),
            ];
            print_record(&out, &fields, format);
        }
    }

    outcome.map_err(|err| session_error("write failed", err))?;
    Ok(SUCCESS)
}

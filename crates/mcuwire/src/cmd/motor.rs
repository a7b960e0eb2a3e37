use serde::Serialize;

use crate::cmd::{open_session, MotorArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::logging::log_sink;
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct MotorOutput {
    mode: u8,
    accepted: bool,
}

pub fn run(args: MotorArgs, format: OutputFormat) -> CliResult<i32> {
    let session = open_session(&args.device, log_sink())?;
    let outcome = session.motor_control(args.mode);
    session.disconnect();
    outcome.map_err(|err| session_error("motor control failed", err))?;

    let out = MotorOutput {
        mode: args.mode,
        accepted: true,
    };
    print_record(
        &out,
        &[
            ("Mode", out.mode.to_string()),
            ("Accepted", out.accepted.to_string()),
        ],
        format,
    );
    Ok(SUCCESS)
}

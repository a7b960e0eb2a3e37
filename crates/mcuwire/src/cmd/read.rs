use serde::Serialize;

use crate::cmd::{open_session, ReadArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::logging::log_sink;
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct ReadOutput {
    address: String,
    value_type: mcuwire_frame::ValueType,
    value: f64,
}

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let session = open_session(&args.device, log_sink())?;
    let value = session
        .read_typed(args.address, args.value_type)
        .map_err(|err| session_error("read failed", err))?;
    session.disconnect();

    let out = ReadOutput {
        address: format!("0x{:08X}", args.address),
        value_type: args.value_type,
        value,
    };
    let fields = [
        ("Address", out.address.clone()),
        ("Type", out.value_type.to_string()),
        ("Value", out.value.to_string()),
    ];
    print_record(&out, &fields, format);
    Ok(SUCCESS)
}

use mcuwire_frame::{Capabilities, PROTOCOL_VERSION};
use serde::Serialize;

use crate::cmd::{open_session, HelloArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::logging::log_sink;
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct HelloOutput {
    port: String,
    frame_version: u8,
    protocol_version: u16,
    capabilities: u32,
    capability_names: Vec<&'static str>,
}

pub fn run(args: HelloArgs, format: OutputFormat) -> CliResult<i32> {
    let session = open_session(&args.device, log_sink())?;
    let info = session
        .hello()
        .map_err(|err| session_error("hello failed", err))?;
    session.disconnect();

    let out = HelloOutput {
        port: args.device.port,
        frame_version: PROTOCOL_VERSION,
        protocol_version: info.protocol_version,
        capabilities: info.capabilities.bits(),
        capability_names: capability_names(info.capabilities),
    };

    let fields = [
        ("Port", out.port.clone()),
        ("Protocol", format!("0x{:04X}", out.protocol_version)),
        (
            "Capabilities",
            format!("0x{:08X} {}", out.capabilities, out.capability_names.join(" ")),
        ),
    ];
    print_record(&out, &fields, format);
    Ok(SUCCESS)
}

/// Names of the known capability bits that are set.
fn capability_names(caps: Capabilities) -> Vec<&'static str> {
    caps.iter_names().map(|(name, _)| name).collect()
}

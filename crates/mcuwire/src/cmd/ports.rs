use mcuwire_transport::list_ports;
use serde::Serialize;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_rows, OutputFormat};

#[derive(Serialize)]
struct PortOutput {
    name: String,
    kind: &'static str,
}

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let ports: Vec<PortOutput> = list_ports()
        .map_err(|err| transport_error("port discovery failed", err))?
        .into_iter()
        .map(|port| PortOutput {
            name: port.name,
            kind: port.kind,
        })
        .collect();

    let rows = ports
        .iter()
        .map(|p| vec![p.name.clone(), p.kind.to_string()])
        .collect();
    print_rows(&ports, &["PORT", "KIND"], rows, format);
    Ok(SUCCESS)
}

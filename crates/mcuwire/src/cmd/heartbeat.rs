use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde::Serialize;

use crate::cmd::{install_ctrlc_handler, open_session, parse_duration, HeartbeatArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::logging::log_sink;
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct HeartbeatOutput {
    loop_tick: u32,
    system_mode: u8,
    rx_drop: u16,
    tx_drop: u16,
}

pub fn run(args: HeartbeatArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let session = open_session(&args.device, log_sink())?;

    for poll in 0..args.count {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if poll > 0 {
            thread::sleep(interval);
        }

        let hb = session
            .heartbeat()
            .map_err(|err| session_error("heartbeat failed", err))?;
        let out = HeartbeatOutput {
            loop_tick: hb.loop_tick,
            system_mode: hb.system_mode,
            rx_drop: hb.rx_drop,
            tx_drop: hb.tx_drop,
        };
        let fields = [
            ("Tick", out.loop_tick.to_string()),
            ("Mode", out.system_mode.to_string()),
            ("RX drops", out.rx_drop.to_string()),
            ("TX drops", out.tx_drop.to_string()),
        ];
        print_record(&out, &fields, format);
    }

    session.disconnect();
    Ok(SUCCESS)
}

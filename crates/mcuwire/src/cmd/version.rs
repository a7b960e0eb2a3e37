use mcuwire_frame::{DEFAULT_MAX_PAYLOAD, PROTOCOL_VERSION};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("mcuwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: mcuwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("frame_version: 0x{PROTOCOL_VERSION:02X}");
    println!("max_payload: {DEFAULT_MAX_PAYLOAD}");
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "profile: {}",
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}

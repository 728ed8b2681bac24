use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("leap {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: leap");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("LEAP_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "frame: max_header_len={}, max_payload={}",
        leap_frame::DEFAULT_MAX_HEADER_LEN,
        leap_frame::DEFAULT_MAX_PAYLOAD
    );
    println!("llsd: notation, max_depth={}", leap_llsd::notation::MAX_DEPTH);
    println!("features: plugin={}, cli=true", cfg!(feature = "plugin"));

    Ok(SUCCESS)
}

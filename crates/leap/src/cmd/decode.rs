use std::io;

use leap_frame::{FrameError, FrameReader};
use leap_llsd::from_notation;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, parse_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::print_value;

pub fn run(args: DecodeArgs) -> CliResult<i32> {
    let mut reader = FrameReader::new(io::stdin().lock());
    let mut frames = 0usize;

    loop {
        let payload = match reader.read_frame() {
            Ok(payload) => payload,
            Err(FrameError::PeerShutdown(reason)) => {
                if reader.buffered() > 0 {
                    return Err(CliError::new(
                        DATA_INVALID,
                        format!("truncated frame after {frames} frames: {reason}"),
                    ));
                }
                tracing::debug!(frames, "end of input");
                return Ok(SUCCESS);
            }
            Err(err) => return Err(frame_error("read stdin", err)),
        };
        frames += 1;

        let value = from_notation(&payload).map_err(|err| {
            for line in err.diagnostic_lines() {
                tracing::error!("{line}");
            }
            parse_error(&format!("frame {frames}"), err)
        })?;
        print_value(&value, args.format)?;
    }
}

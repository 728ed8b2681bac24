use std::io;

use leap_frame::FrameWriter;
use leap_llsd::{from_notation, to_notation, Map, Value};
use leap_plugin::Envelope;
use uuid::Uuid;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, parse_error, CliError, CliResult, DATA_INVALID, SUCCESS};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let payload = if args.startup {
        startup_payload(Uuid::new_v4(), Uuid::new_v4())
    } else {
        let data = match (args.json, args.notation) {
            (Some(json), _) => {
                let json: serde_json::Value = serde_json::from_str(&json)
                    .map_err(|err| CliError::new(DATA_INVALID, format!("invalid JSON: {err}")))?;
                Value::from(json)
            }
            (None, Some(notation)) => from_notation(notation.as_bytes())
                .map_err(|err| parse_error("invalid notation", err))?,
            (None, None) => Value::map(),
        };
        Envelope::new(args.pump, data).to_notation()
    };

    // No trailing newline: the next byte on the wire must be a header digit.
    let mut writer = FrameWriter::new(io::stdout().lock());
    writer
        .write_frame(&payload)
        .map_err(|err| frame_error("write stdout", err))?;
    Ok(SUCCESS)
}

/// The message a host sends first: reply pump as `pump`, command pump and
/// an empty feature map as `data`.
fn startup_payload(reply_pump: Uuid, command_pump: Uuid) -> Vec<u8> {
    let mut data = Map::new();
    data.insert(
        "command".to_string(),
        Value::from(command_pump.hyphenated().to_string()),
    );
    data.insert("features".to_string(), Value::map());
    let mut envelope = Map::new();
    envelope.insert("data".to_string(), Value::Map(data));
    envelope.insert(
        "pump".to_string(),
        Value::from(reply_pump.hyphenated().to_string()),
    );
    to_notation(&Value::Map(envelope))
}

use std::io::{self, Write};

use clap::ValueEnum;
use leap_llsd::{to_notation, Value};

use crate::exit::{io_error, CliResult};

/// How `decode` prints each payload.
#[derive(Clone, Debug, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// One JSON document per line.
    #[default]
    Json,
    /// Canonical LLSD notation, one value per line.
    Notation,
}

pub fn render(value: &Value, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => value.to_json().to_string(),
        OutputFormat::Notation => String::from_utf8_lossy(&to_notation(value)).into_owned(),
    }
}

pub fn print_value(value: &Value, format: OutputFormat) -> CliResult<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", render(value, format))
        .and_then(|()| out.flush())
        .map_err(|err| io_error("write stdout", err))
}

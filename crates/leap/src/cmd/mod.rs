use std::future::Future;
use std::time::Duration;

use clap::{Args, Subcommand};
use leap_plugin::{PluginError, StopReason, DEFAULT_CONTROLLER_PUMP};

use crate::exit::{plugin_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod hello;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the hello-world plugin: send a greeting every interval.
    Hello(HelloArgs),
    /// Run a plugin that logs every event it receives.
    Run(RunArgs),
    /// Print one framed message, for feeding a plugin by hand.
    Encode(EncodeArgs),
    /// Read frames from stdin and print their payloads.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Hello(args) => hello::run(args),
        Command::Run(args) => run::run(args),
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct HelloArgs {
    /// Pump to send greetings to.
    #[arg(long, default_value = "helloworld")]
    pub pump: String,
    /// Time between greetings (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Exit after sending N greetings.
    #[arg(long)]
    pub count: Option<u64>,
    /// Listen on the controller pump before sending.
    #[arg(long)]
    pub listen: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pump to listen on for controller events.
    #[arg(long, default_value = DEFAULT_CONTROLLER_PUMP)]
    pub controller_pump: String,
    /// Stop after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Skip the listen request.
    #[arg(long)]
    pub no_listen: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Pump the envelope is addressed to.
    #[arg(long, default_value = DEFAULT_CONTROLLER_PUMP)]
    pub pump: String,
    /// JSON payload.
    #[arg(
        long,
        conflicts_with_all = ["notation", "startup"],
        required_unless_present_any = ["notation", "startup"]
    )]
    pub json: Option<String>,
    /// LLSD notation payload.
    #[arg(long, conflicts_with_all = ["json", "startup"])]
    pub notation: Option<String>,
    /// Print a host startup message with fresh pump ids instead.
    #[arg(long)]
    pub startup: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// How to print each payload.
    #[arg(long, value_name = "FORMAT", default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Drive `fut` on a current-thread runtime inside a `LocalSet`, which the
/// plugin runtime requires.
pub(crate) fn block_on_local<F: Future>(fut: F) -> CliResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;
    let local = tokio::task::LocalSet::new();
    let output = local.block_on(&runtime, fut);
    drop(local);
    // A read on stdin may still be parked on a blocking thread.
    runtime.shutdown_background();
    Ok(output)
}

/// Map the end of a plugin's life to an exit code.
pub(crate) fn finish(result: Result<StopReason, PluginError>) -> CliResult<i32> {
    match result {
        Ok(reason) => {
            tracing::info!(?reason, "plugin stopped");
            Ok(SUCCESS)
        }
        Err(err) => Err(plugin_error("plugin stopped", err)),
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        _ => Duration::from_secs(value),
    })
}

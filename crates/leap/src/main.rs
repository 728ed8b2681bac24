mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "leap", version, about = "LEAP plugin protocol tools")]
struct Cli {
    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "text",
        env = "LEAP_LOG_FORMAT",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "LEAP_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match cmd::run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) if err.code == exit::SUCCESS => {
            tracing::info!("{err}");
            std::process::exit(exit::SUCCESS);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello_subcommand() {
        let cli = Cli::try_parse_from(["leap", "hello", "--interval", "250ms", "--count", "3"])
            .expect("hello args should parse");
        match cli.command {
            Command::Hello(args) => {
                assert_eq!(args.pump, "helloworld");
                assert_eq!(args.count, Some(3));
                assert!(!args.listen);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn encode_requires_a_payload_source() {
        let err = Cli::try_parse_from(["leap", "encode"]).expect_err("missing payload should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "leap",
            "encode",
            "--json",
            "{\"command\":\"stop\"}",
            "--notation",
            "{'command':'stop'}",
        ])
        .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_run_with_global_log_flags() {
        let cli = Cli::try_parse_from([
            "leap",
            "run",
            "--no-listen",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .expect("run args should parse");
        assert!(matches!(cli.log_level, LogLevel::Debug));
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(cli.command, Command::Run(ref args) if args.no_listen));
    }
}

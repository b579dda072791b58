mod cmd;
mod exit;
mod logging;
mod output;
mod port;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "probescope", version, about = "ProbeScope instrument protocol CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::EncodeCommand;

    #[test]
    fn parses_encode_read_with_hex_address() {
        let cli = Cli::try_parse_from(["probescope", "encode", "read", "0x4000", "16"])
            .expect("encode args should parse");

        match cli.command {
            Command::Encode(args) => assert!(matches!(
                args.command,
                EncodeCommand::Read {
                    address: 0x4000,
                    length: 16
                }
            )),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_monitor_with_separate_tx() {
        let cli = Cli::try_parse_from([
            "probescope",
            "monitor",
            "/tmp/probe.rx",
            "--tx",
            "/tmp/probe.tx",
            "--count",
            "3",
            "--init",
        ])
        .expect("monitor args should parse");

        match cli.command {
            Command::Monitor(args) => {
                assert_eq!(args.count, Some(3));
                assert!(args.init);
                assert_eq!(args.link.tx.as_deref(), Some(std::path::Path::new("/tmp/probe.tx")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "probescope",
            "decode",
            "--hex",
            "--format",
            "pretty",
            "--log-level",
            "warn",
        ])
        .expect("global flags should parse after the subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Pretty)));
        assert!(matches!(cli.command, Command::Decode(_)));
    }

    #[test]
    fn rejects_bad_register_address() {
        let err = Cli::try_parse_from(["probescope", "encode", "read", "0xZZ", "1"])
            .expect_err("bad address should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn encode_requires_a_command() {
        let err = Cli::try_parse_from(["probescope", "encode"]).expect_err("missing subcommand");
        assert!(matches!(
            err.kind(),
            clap::error::ErrorKind::MissingSubcommand
                | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        ));
    }
}

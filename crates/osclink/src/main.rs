mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "osclink",
    version,
    about = "Control messages framed inside terminal escape sequences"
)]
struct Cli {
    /// Output format for decoded frames.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
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

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from(["osclink", "send", "--channel", "9998", "--data", "hello"])
            .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.channel, 9998);
                assert_eq!(args.data.as_deref(), Some("hello"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_defaults_to_controlled_channel() {
        let cli = Cli::try_parse_from(["osclink", "send"]).expect("send args should parse");
        assert!(matches!(cli.command, Command::Send(args) if args.channel == 9999));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from(["osclink", "send", "--stdin", "--data", "hello"])
            .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_echo_defaults() {
        let cli = Cli::try_parse_from(["osclink", "echo"]).expect("echo args should parse");
        match cli.command {
            Command::Echo(args) => {
                assert_eq!(args.listen_on, 9998);
                assert_eq!(args.reply_on, 9999);
                assert_eq!(args.prefix, "echo: ");
                assert!(args.greeting.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_listen_channel_list() {
        let cli = Cli::try_parse_from([
            "osclink",
            "--format",
            "json",
            "listen",
            "--channels",
            "9998,9999",
            "--count",
            "2",
        ])
        .expect("listen args should parse");

        match cli.command {
            Command::Listen(args) => {
                assert_eq!(args.channels, Some(vec![9998, 9999]));
                assert_eq!(args.count, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_numeric_channel() {
        let err = Cli::try_parse_from(["osclink", "send", "--channel", "ping"])
            .expect_err("channel must be numeric");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}

use clap::{Args, Subcommand};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use osclink_frame::{CONTROLLED, SUPERVISOR};

use crate::exit::{io_error, signal_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer control messages read from stdin with replies on stdout.
    Echo(EchoArgs),
    /// Write a single frame to stdout.
    Send(SendArgs),
    /// Print frames read from stdin as they arrive.
    Listen(ListenArgs),
    /// Decode all frames from stdin until EOF.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args),
        Command::Send(args) => send::run(args),
        Command::Listen(args) => listen::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Channel to answer.
    #[arg(long, default_value_t = SUPERVISOR)]
    pub listen_on: u32,
    /// Channel replies are sent on.
    #[arg(long, default_value_t = CONTROLLED)]
    pub reply_on: u32,
    /// Text prepended to every echoed payload.
    #[arg(long, default_value = "echo: ")]
    pub prefix: String,
    /// Message sent on the reply channel before reading.
    #[arg(long)]
    pub greeting: Option<String>,
    /// Append a newline after each frame.
    #[arg(long)]
    pub newline: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel to send on.
    #[arg(long, short = 'c', default_value_t = CONTROLLED)]
    pub channel: u32,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["file", "stdin"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "stdin"])]
    pub file: Option<PathBuf>,
    /// Read payload from stdin until EOF.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub stdin: bool,
    /// Append a newline after the frame.
    #[arg(long)]
    pub newline: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Filter to specific channels (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<u32>>,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Copy the raw stream to stderr while decoding.
    #[arg(long)]
    pub passthrough: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Filter to specific channels (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<u32>>,
    /// Fail with a data error if no frame was found.
    #[arg(long)]
    pub require_frame: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Returns true if `channel` passes an optional channel filter.
pub fn accepts(filter: Option<&[u32]>, channel: u32) -> bool {
    filter.is_none_or(|channels| channels.contains(&channel))
}

/// Run a stdin-driven loop on a worker thread until it finishes or Ctrl-C.
///
/// A blocking read on stdin never returns to check a flag, so the signal is
/// raced against the worker instead. Returns the worker's exit code, or
/// `None` when interrupted; an interrupted worker is left blocked and ends
/// with the process.
pub fn run_interruptible<F>(work: F) -> CliResult<Option<i32>>
where
    F: FnOnce() -> CliResult<i32> + Send + 'static,
{
    let (done, events) = mpsc::channel();
    let interrupted = done.clone();
    ctrlc::set_handler(move || {
        let _ = interrupted.send(None);
    })
    .map_err(signal_error)?;

    thread::Builder::new()
        .name("osclink-reader".into())
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(work))
                .unwrap_or_else(|_| Err(CliError::new(INTERNAL, "reader thread panicked")));
            let _ = done.send(Some(result));
        })
        .map_err(|err| io_error("failed to start reader thread", err))?;

    match events.recv() {
        Ok(Some(result)) => result.map(Some),
        Ok(None) | Err(_) => {
            tracing::debug!("interrupted");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_filter() {
        assert!(accepts(None, 1));
        assert!(accepts(Some(&[9998, 9999]), 9999));
        assert!(!accepts(Some(&[9998]), 9999));
    }
}

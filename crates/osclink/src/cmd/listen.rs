use std::io::{Read, Write};

use osclink_frame::{FrameError, FrameReader, Passthrough};

use crate::cmd::{accepts, run_interruptible, ListenArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == Some(0) {
        return Err(CliError::new(USAGE, "--count must be at least 1"));
    }

    match run_interruptible(move || listen(args, format))? {
        Some(code) => Ok(code),
        None => {
            std::io::stdout()
                .lock()
                .flush()
                .map_err(|err| io_error("flush failed", err))?;
            Ok(SUCCESS)
        }
    }
}

fn listen(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let stdin = std::io::stdin().lock();
    let source: Box<dyn Read> = if args.passthrough {
        Box::new(Passthrough::new(stdin, std::io::stderr()))
    } else {
        Box::new(stdin)
    };
    let mut reader = FrameReader::new(source);

    let mut printed = 0usize;

    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        if !accepts(args.channels.as_deref(), frame.channel) {
            tracing::debug!(channel = frame.channel, "skipping filtered channel");
            continue;
        }

        print_frame(&frame, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            return Ok(SUCCESS);
        }
    }

    tracing::debug!(printed, "input closed");
    Ok(SUCCESS)
}

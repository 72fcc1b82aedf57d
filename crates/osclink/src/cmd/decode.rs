use std::io::Read;

use osclink_frame::decode;

use crate::cmd::{accepts, DecodeArgs};
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut input = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut input)
        .map_err(|err| io_error("failed reading stdin", err))?;

    let (frames, rest) = decode(&input);
    tracing::debug!(
        input = input.len(),
        frames = frames.len(),
        trailing = rest.len(),
        "decoded input"
    );

    let mut printed = 0usize;
    for frame in frames
        .iter()
        .filter(|frame| accepts(args.channels.as_deref(), frame.channel))
    {
        print_frame(frame, format);
        printed += 1;
    }

    if args.require_frame && printed == 0 {
        return Err(CliError::new(DATA_INVALID, "no frames found in input"));
    }
    Ok(SUCCESS)
}

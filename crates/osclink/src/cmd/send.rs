use std::fs;
use std::io::Read;

use osclink_frame::{channel_name, FrameConfig, FrameWriter};

use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;

    let config = FrameConfig {
        trailing_newline: args.newline,
        ..FrameConfig::default()
    };
    let mut writer = FrameWriter::with_config(std::io::stdout().lock(), config);
    writer
        .send(args.channel, &payload)
        .map_err(|err| frame_error("send failed", err))?;

    tracing::debug!(
        channel = args.channel,
        channel_name = channel_name(args.channel),
        size = payload.len(),
        "frame sent"
    );
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    if args.stdin {
        let mut payload = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut payload)
            .map_err(|err| io_error("failed reading stdin", err))?;
        return Ok(payload);
    }
    Ok(Vec::new())
}

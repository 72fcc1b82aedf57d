use std::io::{Stdout, Write};

use osclink_frame::{
    channel_name, handler_fn, pump, ChannelMux, FrameConfig, FrameWriter, Handler,
    SharedFrameWriter, StreamReader,
};

use crate::cmd::{run_interruptible, EchoArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let config = FrameConfig {
        trailing_newline: args.newline,
        ..FrameConfig::default()
    };
    let writer = SharedFrameWriter::new(FrameWriter::with_config(std::io::stdout(), config));

    let replies = writer.clone();
    match run_interruptible(move || serve(args, replies))? {
        Some(code) => Ok(code),
        None => {
            // Waits out a reply in flight so the stream never ends mid-frame.
            writer
                .close()
                .map_err(|err| frame_error("flush failed", err))?;
            Ok(SUCCESS)
        }
    }
}

fn serve(args: EchoArgs, writer: SharedFrameWriter<Stdout>) -> CliResult<i32> {
    if let Some(greeting) = &args.greeting {
        writer
            .send(args.reply_on, greeting.as_bytes())
            .map_err(|err| frame_error("greeting failed", err))?;
    }

    let mut mux = ChannelMux::new();
    mux.register(args.listen_on, echo_handler(writer, args.reply_on, args.prefix));

    tracing::info!(
        listen_on = args.listen_on,
        listen_name = channel_name(args.listen_on),
        reply_on = args.reply_on,
        "echo server ready"
    );

    let mut reader = StreamReader::new(mux);
    let stats = pump(&mut std::io::stdin().lock(), &mut reader)
        .map_err(|err| frame_error("read failed", err))?;

    let dispatched = reader.sink().stats();
    tracing::info!(
        bytes = stats.bytes_read,
        frames = stats.frames,
        echoed = dispatched.delivered,
        ignored = dispatched.unrouted,
        failed = dispatched.failed,
        "input closed"
    );
    Ok(SUCCESS)
}

fn echo_handler<W>(writer: SharedFrameWriter<W>, reply_on: u32, prefix: String) -> impl Handler
where
    W: Write + Send + 'static,
{
    handler_fn(move |payload: &[u8]| {
        tracing::info!(size = payload.len(), "echoing frame");
        let mut reply = Vec::with_capacity(prefix.len() + payload.len());
        reply.extend_from_slice(prefix.as_bytes());
        reply.extend_from_slice(payload);
        writer.send(reply_on, &reply)?;
        Ok(())
    })
}

//! Echo link example: both ends of a terminal stream in one process.
//!
//! A socket pair stands in for the PTY. The supervisor sends a ping on its
//! channel; the controlled side answers on its own channel while also
//! printing ordinary terminal output on the same stream.
//!
//! Run with:
//!   cargo run --example echo-link

#[cfg(unix)]
use std::io::Write;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::thread;

#[cfg(unix)]
use osclink::frame::{
    handler_fn, pump, ChannelMux, Direction, FrameWriter, HandlerError, Inbox, SharedFrameWriter,
    StreamReader,
};

#[cfg(not(unix))]
fn main() {
    eprintln!("echo-link uses a Unix socket pair in place of a PTY; run it on a Unix host");
}

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (supervisor_end, controlled_end) = UnixStream::pair()?;

    // Controlled side: echo everything the supervisor sends.
    let controlled = {
        let reply = SharedFrameWriter::new(FrameWriter::new(controlled_end.try_clone()?));
        let side = Direction::Controlled;
        thread::spawn(move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            reply.with_stream(|stream| stream.write_all(b"$ ./server\r\nServer started.\r\n"))?;

            let mut mux = ChannelMux::new();
            let writer = reply.clone();
            mux.register(
                side.inbound(),
                handler_fn(move |payload: &[u8]| {
                    let mut answer = b"echo: ".to_vec();
                    answer.extend_from_slice(payload);
                    writer.send(side.outbound(), &answer)?;
                    Ok::<(), HandlerError>(())
                }),
            );

            let mut reader = StreamReader::new(mux);
            pump(&mut &controlled_end, &mut reader)?;
            Ok(())
        })
    };

    // Supervisor side: collect replies into an inbox.
    let side = Direction::Supervisor;
    let replies = Inbox::new();
    let mut mux = ChannelMux::new();
    mux.register(side.inbound(), replies.clone());

    let mut writer = FrameWriter::new(supervisor_end.try_clone()?);
    writer.send(side.outbound(), b"ping from GUI")?;

    let reader_end = supervisor_end.try_clone()?;
    let supervisor = thread::spawn(move || {
        let mut reader = StreamReader::new(mux);
        pump(&mut &reader_end, &mut reader)
    });

    let answer = replies.wait_and_pop()?;
    eprintln!("[supervisor] {}", String::from_utf8_lossy(&answer));

    supervisor_end.shutdown(std::net::Shutdown::Both)?;
    controlled
        .join()
        .expect("controlled thread should not panic")
        .expect("controlled side should complete without error");
    supervisor
        .join()
        .expect("supervisor thread should not panic")?;
    Ok(())
}

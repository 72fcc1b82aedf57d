//! Inbox example: a request loop that pulls control messages one at a time.
//!
//! The reader thread drains the stream into an inbox; the main loop blocks
//! on the next request and answers it, the way a program running inside the
//! terminal would serve requests from its supervisor.
//!
//! Run with:
//!   cargo run --example inbox-pull

use std::io::Cursor;
use std::thread;

use osclink::frame::{
    encode_to_vec, pump, ChannelMux, FrameWriter, Inbox, StreamReader, CONTROLLED, SUPERVISOR,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = b"Server started. Reaching out to client.\r\n".to_vec();
    stream.extend_from_slice(&encode_to_vec(SUPERVISOR, b"REQUEST/TOPOLOGY"));
    stream.extend_from_slice(b"\x1b[2K\r");
    stream.extend_from_slice(&encode_to_vec(SUPERVISOR, b"REQUEST/HEATMAP-DATA"));

    let requests = Inbox::new();
    let mut mux = ChannelMux::new();
    mux.register(SUPERVISOR, requests.clone());

    let closer = requests.clone();
    let reader = thread::spawn(move || {
        let mut reader = StreamReader::new(mux);
        let result = pump(&mut Cursor::new(stream), &mut reader);
        closer.close();
        result
    });

    let mut out = FrameWriter::new(Vec::new());
    while let Ok(request) = requests.wait_and_pop() {
        match &request[..] {
            b"REQUEST/TOPOLOGY" => out.send(CONTROLLED, b"TOPOLOGY")?,
            b"REQUEST/HEATMAP-DATA" => {
                let data: Vec<String> = (0..8u32)
                    .map(|i| (i * 12_347 % 100_000).to_string())
                    .collect();
                out.send(CONTROLLED, format!("HEATMAP-DATA\n{}", data.join("\n")).as_bytes())?;
            }
            other => eprintln!("unknown request: {}", String::from_utf8_lossy(other)),
        }
    }

    let stats = reader.join().expect("reader thread should not panic")?;
    eprintln!(
        "read {} bytes, {} frames, wrote {} bytes of replies",
        stats.bytes_read,
        stats.frames,
        out.get_ref().len()
    );
    Ok(())
}

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;

use crate::codec::{decode_next_limited, enforce_buffer_limit, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::mux::FrameSink;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Push-style frame extraction for one stream direction.
///
/// Owns the parse buffer. Callers feed it chunks of any size as they arrive;
/// every complete frame is handed to the sink in stream order.
pub struct StreamReader<S> {
    buf: BytesMut,
    sink: S,
    max_buffer_size: Option<usize>,
    closed: bool,
}

impl<S: FrameSink> StreamReader<S> {
    /// Create a stream reader with default configuration.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, &FrameConfig::default())
    }

    /// Create a stream reader with explicit configuration.
    pub fn with_config(sink: S, config: &FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            sink,
            max_buffer_size: config.max_buffer_size,
            closed: false,
        }
    }

    /// Append a chunk and dispatch every frame it completes.
    ///
    /// Returns the number of frames delivered. Chunks arriving after
    /// [`on_stream_closed`](Self::on_stream_closed) are ignored.
    pub fn on_bytes_received(&mut self, chunk: &[u8]) -> usize {
        if self.closed {
            tracing::trace!(len = chunk.len(), "ignoring bytes after stream close");
            return 0;
        }

        self.buf.extend_from_slice(chunk);

        let mut delivered = 0;
        while let Some(frame) = decode_next_limited(&mut self.buf, self.max_buffer_size) {
            self.sink.deliver(frame);
            delivered += 1;
        }

        if let Some(max) = self.max_buffer_size {
            enforce_buffer_limit(&mut self.buf, max);
        }
        delivered
    }

    /// End of stream: discard any dangling partial frame.
    pub fn on_stream_closed(&mut self) {
        if !self.buf.is_empty() {
            tracing::trace!(
                discarded = self.buf.len(),
                "discarding partial frame at end of stream"
            );
        }
        self.buf.clear();
        self.closed = true;
    }

    /// Number of unconsumed bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns true once the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Borrow the frame sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrow the frame sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the reader and return the frame sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Totals for one [`pump`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub bytes_read: u64,
    pub frames: u64,
}

/// Drive a [`StreamReader`] from a byte source until end of stream.
///
/// Read timeouts (`WouldBlock`/`TimedOut`) with no data simply loop. Any
/// other read error is a stream fault: the reader is closed and the error
/// returned once.
pub fn pump<R: Read, S: FrameSink>(
    source: &mut R,
    reader: &mut StreamReader<S>,
) -> Result<PumpStats> {
    run_pump(source, reader, None)
}

/// Like [`pump`], but also returns when `running` is cleared.
///
/// The flag is checked between reads, so the source should have a read
/// timeout for prompt shutdown.
pub fn pump_while<R: Read, S: FrameSink>(
    source: &mut R,
    reader: &mut StreamReader<S>,
    running: &AtomicBool,
) -> Result<PumpStats> {
    run_pump(source, reader, Some(running))
}

fn run_pump<R: Read, S: FrameSink>(
    source: &mut R,
    reader: &mut StreamReader<S>,
    running: Option<&AtomicBool>,
) -> Result<PumpStats> {
    let mut stats = PumpStats::default();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        if running.is_some_and(|flag| !flag.load(Ordering::SeqCst)) {
            reader.on_stream_closed();
            return Ok(stats);
        }

        match source.read(&mut chunk) {
            Ok(0) => {
                reader.on_stream_closed();
                return Ok(stats);
            }
            Ok(n) => {
                stats.bytes_read += n as u64;
                stats.frames += reader.on_bytes_received(&chunk[..n]) as u64;
            }
            Err(err) if is_retryable(err.kind()) => continue,
            Err(err) => {
                reader.on_stream_closed();
                return Err(FrameError::Io(err));
            }
        }
    }
}

fn is_retryable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads and interleaved terminal output internally;
/// callers always get complete, valid frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. Any
    /// partial frame still buffered at that point is discarded.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.try_read_frame()? {
                return Ok(frame);
            }
        }
    }

    /// Read until a frame completes or the source times out.
    ///
    /// Returns `Ok(None)` when a read reports `WouldBlock` or `TimedOut`, so
    /// callers with a read timeout get control back periodically.
    pub fn try_read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let limit = self.config.max_buffer_size;
            if let Some(frame) = decode_next_limited(&mut self.buf, limit) {
                return Ok(Some(frame));
            }
            if let Some(max) = limit {
                enforce_buffer_limit(&mut self.buf, max);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_retryable(err.kind()) => return Ok(None),
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.buf.clear();
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Frame>;

    /// Yields frames until the stream closes; stream faults are yielded once.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// A `Read` adapter that copies every byte it reads to a terminal sink.
///
/// Control frames share the stream with ordinary terminal output. Wrapping
/// the source keeps the visible terminal untouched while frames are
/// extracted from the same bytes.
pub struct Passthrough<R, W> {
    source: R,
    terminal: W,
}

impl<R: Read, W: Write> Passthrough<R, W> {
    pub fn new(source: R, terminal: W) -> Self {
        Self { source, terminal }
    }

    /// Consume the adapter and return the source and terminal.
    pub fn into_parts(self) -> (R, W) {
        (self.source, self.terminal)
    }
}

impl<R: Read, W: Write> Read for Passthrough<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.source.read(buf)?;
        if n > 0 {
            self.terminal.write_all(&buf[..n])?;
            self.terminal.flush()?;
        }
        Ok(n)
    }
}

use std::io::{ErrorKind, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const MAX_BACKOFF: Duration = Duration::from_millis(50);

/// Writes complete frames to any `Write` stream.
///
/// Each frame is encoded in full before the first byte is written, and the
/// whole encoding is written before `send` returns.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    closed: bool,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            closed: false,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.channel, frame.payload.as_ref())
    }

    /// Encode and send a payload on a channel.
    ///
    /// Fails with `ConnectionClosed` after [`close`](Self::close).
    pub fn send(&mut self, channel: u32, payload: &[u8]) -> Result<()> {
        if self.closed {
            return Err(FrameError::ConnectionClosed);
        }
        self.buf.clear();
        encode_frame(channel, payload, &mut self.buf);
        if self.config.trailing_newline {
            self.buf.put_u8(b'\n');
        }

        // Once the first byte is out the frame must be finished, so a full
        // non-blocking stream is waited out rather than reported.
        let mut backoff = Backoff::default();
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    offset += n;
                    backoff.reset();
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => backoff.wait(),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        tracing::trace!(channel, size = payload.len(), wire = offset, "frame written");
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        let mut backoff = Backoff::default();
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => backoff.wait(),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Flush and stop accepting frames.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.flush()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Growing pause between retries on a stream that reports `WouldBlock`.
#[derive(Default)]
struct Backoff {
    delay: Duration,
}

impl Backoff {
    fn wait(&mut self) {
        if self.delay.is_zero() {
            std::thread::yield_now();
            self.delay = Duration::from_millis(1);
        } else {
            std::thread::sleep(self.delay);
            self.delay = (self.delay * 2).min(MAX_BACKOFF);
        }
    }

    fn reset(&mut self) {
        self.delay = Duration::ZERO;
    }
}

/// A frame writer shared between tasks.
///
/// The writer is locked for the duration of one frame, so frames emitted
/// concurrently never interleave at the byte level.
/// That includes any backoff while the stream is full: other senders wait
/// rather than start a frame the stream cannot take yet.
pub struct SharedFrameWriter<T> {
    inner: Arc<Mutex<FrameWriter<T>>>,
}

impl<T> Clone for SharedFrameWriter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Write> SharedFrameWriter<T> {
    pub fn new(writer: FrameWriter<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Encode and send a payload on a channel as one uninterrupted write.
    pub fn send(&self, channel: u32, payload: &[u8]) -> Result<()> {
        self.lock().send(channel, payload)
    }

    /// Write a complete frame as one uninterrupted write.
    pub fn write_frame(&self, frame: &Frame) -> Result<()> {
        self.lock().write_frame(frame)
    }

    /// Wait for any frame in flight, then flush and refuse further frames.
    ///
    /// Every clone sees the close, so a shutting-down process never emits a
    /// frame it cannot finish.
    pub fn close(&self) -> Result<()> {
        self.lock().close()
    }

    /// Run `f` with exclusive access to the underlying stream.
    ///
    /// Used to write ordinary terminal bytes without splitting a frame.
    pub fn with_stream<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(self.lock().get_mut())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrameWriter<T>> {
        // A panic mid-write leaves at worst a truncated frame, which readers drop.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> std::fmt::Debug for SharedFrameWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFrameWriter").finish_non_exhaustive()
    }
}

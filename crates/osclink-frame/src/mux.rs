//! Routing of decoded frames to per-channel handlers.
//!
//! Registration happens before the reader starts: a [`StreamReader`] takes
//! its sink by value, so the routing table is read-only while frames are
//! being dispatched.
//!
//! [`StreamReader`]: crate::reader::StreamReader

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;

use crate::channel::channel_name;
use crate::codec::Frame;
use crate::error::HandlerError;

/// Application-supplied reaction to the payload of one frame.
pub trait Handler: Send {
    /// Handle the raw payload of a frame.
    fn handle(&self, payload: &[u8]) -> Result<(), HandlerError>;
}

/// Adapter turning a closure into a [`Handler`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&[u8]) -> Result<(), HandlerError> + Send,
{
    FnHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&[u8]) -> Result<(), HandlerError> + Send,
{
    fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        (self.0)(payload)
    }
}

/// Destination for frames coming out of a reader.
pub trait FrameSink {
    /// Accept one decoded frame.
    fn deliver(&mut self, frame: Frame);
}

impl<F> FrameSink for F
where
    F: FnMut(Frame),
{
    fn deliver(&mut self, frame: Frame) {
        self(frame)
    }
}

/// Result of routing a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handler ran and returned `Ok`.
    Delivered,
    /// No handler is registered for the channel; the frame was dropped.
    Unrouted,
    /// The handler returned an error or panicked.
    Failed,
}

/// Running totals of dispatch outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxStats {
    pub delivered: u64,
    pub unrouted: u64,
    pub failed: u64,
}

/// Routes frames to the handler registered for their channel.
#[derive(Default)]
pub struct ChannelMux {
    handlers: HashMap<u32, Box<dyn Handler>>,
    stats: MuxStats,
}

impl ChannelMux {
    /// Create an empty multiplexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a handler with a channel. A later registration replaces
    /// the earlier one.
    pub fn register(&mut self, channel: u32, handler: impl Handler + 'static) -> &mut Self {
        if self.handlers.insert(channel, Box::new(handler)).is_some() {
            tracing::debug!(
                channel,
                channel_name = channel_name(channel),
                "replaced channel handler"
            );
        }
        self
    }

    /// Remove the handler for a channel, if any.
    pub fn unregister(&mut self, channel: u32) -> bool {
        self.handlers.remove(&channel).is_some()
    }

    /// Returns true if a handler is registered for the channel.
    pub fn is_registered(&self, channel: u32) -> bool {
        self.handlers.contains_key(&channel)
    }

    /// Registered channel ids, ascending.
    pub fn channels(&self) -> Vec<u32> {
        let mut channels: Vec<u32> = self.handlers.keys().copied().collect();
        channels.sort_unstable();
        channels
    }

    /// Dispatch outcome totals so far.
    pub fn stats(&self) -> MuxStats {
        self.stats
    }

    /// Invoke the handler for `frame.channel` with the frame's payload.
    ///
    /// Unknown channels are dropped. Handler errors and panics are caught
    /// here and logged; they never reach the caller.
    pub fn dispatch(&mut self, frame: &Frame) -> Outcome {
        let outcome = self.route(frame);
        match outcome {
            Outcome::Delivered => self.stats.delivered += 1,
            Outcome::Unrouted => self.stats.unrouted += 1,
            Outcome::Failed => self.stats.failed += 1,
        }
        outcome
    }

    fn route(&self, frame: &Frame) -> Outcome {
        let Some(handler) = self.handlers.get(&frame.channel) else {
            tracing::trace!(
                channel = frame.channel,
                size = frame.payload.len(),
                "no handler for channel"
            );
            return Outcome::Unrouted;
        };

        match std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&frame.payload))) {
            Ok(Ok(())) => Outcome::Delivered,
            Ok(Err(err)) => {
                tracing::warn!(channel = frame.channel, error = %err, "channel handler failed");
                Outcome::Failed
            }
            Err(panic) => {
                tracing::warn!(
                    channel = frame.channel,
                    panic = %PanicMessage(panic),
                    "channel handler panicked"
                );
                Outcome::Failed
            }
        }
    }
}

impl FrameSink for ChannelMux {
    fn deliver(&mut self, frame: Frame) {
        self.dispatch(&frame);
    }
}

impl fmt::Debug for ChannelMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelMux")
            .field("channels", &self.channels())
            .field("stats", &self.stats)
            .finish()
    }
}

struct PanicMessage(Box<dyn std::any::Any + Send>);

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            f.write_str("non-string panic payload")
        }
    }
}

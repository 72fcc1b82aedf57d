//! Control-message framing inside terminal escape sequences.
//!
//! A supervising process and a child running in its terminal exchange
//! discrete messages over the same byte stream that carries ordinary
//! terminal output. Every message is framed as an operating system command:
//! - `ESC ]` introducer
//! - a decimal channel id and `;`
//! - the payload, base64-encoded so it can never contain the terminator
//! - a `BEL` terminator
//!
//! Malformed sequences and unknown channels are dropped silently so control
//! parsing can never disrupt the terminal stream it shares.

pub mod channel;
pub mod codec;
pub mod error;
pub mod inbox;
pub mod mux;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use channel::{channel_name, is_known, Direction, CONTROLLED, SUPERVISOR};
pub use codec::{
    decode, decode_candidate, decode_frames, decode_next, decode_next_limited, encode_frame,
    encode_to_vec, Frame, FrameConfig, BEL, ESC,
};
pub use error::{FrameError, HandlerError, Result};
pub use inbox::Inbox;
pub use mux::{handler_fn, ChannelMux, FnHandler, FrameSink, Handler, MuxStats, Outcome};
pub use reader::{pump, pump_while, FrameReader, Passthrough, PumpStats, StreamReader};
pub use writer::{FrameWriter, SharedFrameWriter};

#[cfg(feature = "async")]
pub use async_codec::OscCodec;

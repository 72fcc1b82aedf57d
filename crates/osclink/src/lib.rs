//! Out-of-band control messages inside a shared terminal stream.
//!
//! osclink lets a supervising process (a display surface holding the PTY)
//! and the program running in that terminal exchange discrete messages
//! without disturbing what the terminal shows.
//!
//! # Crate Structure
//!
//! - [`frame`]: escape-sequence framing, stream reader, channel multiplexer
//!
//! The `cli` feature builds the `osclink` binary, which speaks the protocol
//! over stdin/stdout.

/// Re-export frame types.
pub mod frame {
    pub use osclink_frame::*;
}

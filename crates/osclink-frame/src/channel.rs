//! Built-in channel IDs.
//!
//! The two known channels carry one control stream per side of the
//! terminal. Any other numeric id is legal on the wire and is routed
//! like any other; a receiver with no handler for it drops the frame.

/// Control message originating from the supervising side (display surface).
pub const SUPERVISOR: u32 = 9998;

/// Control message originating from the controlled side (child process).
pub const CONTROLLED: u32 = 9999;

/// Returns a human-readable name for a channel ID.
pub fn channel_name(id: u32) -> &'static str {
    match id {
        SUPERVISOR => "SUPERVISOR",
        CONTROLLED => "CONTROLLED",
        _ => "UNKNOWN",
    }
}

/// Returns true if the channel ID is one of the built-in channels.
pub fn is_known(id: u32) -> bool {
    matches!(id, SUPERVISOR | CONTROLLED)
}

/// Which end of the terminal a link endpoint sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The process owning the PTY primary and the display surface.
    Supervisor,
    /// The process running inside the terminal.
    Controlled,
}

impl Direction {
    /// Channel this side emits its own messages on.
    pub fn outbound(self) -> u32 {
        match self {
            Direction::Supervisor => SUPERVISOR,
            Direction::Controlled => CONTROLLED,
        }
    }

    /// Channel this side listens to.
    pub fn inbound(self) -> u32 {
        self.peer().outbound()
    }

    /// The opposite end of the link.
    pub fn peer(self) -> Direction {
        match self {
            Direction::Supervisor => Direction::Controlled,
            Direction::Controlled => Direction::Supervisor,
        }
    }
}

use std::fmt;
use std::io;

use osclink_frame::FrameError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed | FrameError::InboxClosed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn signal_error(err: ctrlc::Error) -> CliError {
    CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_exit_codes() {
        let denied = io_error("open", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.code, PERMISSION_DENIED);
        assert!(denied.message.starts_with("open: "));

        let timeout = io_error("read", io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(timeout.code, TIMEOUT);

        let other = io_error("read", io::Error::other("weird"));
        assert_eq!(other.code, INTERNAL);
    }

    #[test]
    fn frame_errors_map_to_exit_codes() {
        let closed = frame_error("recv", FrameError::ConnectionClosed);
        assert_eq!(closed.code, FAILURE);
        assert_eq!(closed.to_string(), "recv: connection closed");

        let pipe = frame_error("send", FrameError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert_eq!(pipe.code, FAILURE);
    }
}

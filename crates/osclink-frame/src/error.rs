/// Errors that can occur while reading or writing frames.
///
/// Malformed frames are not errors: the decoder drops them silently.
/// Only faults on the underlying byte stream surface here.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached end-of-file.
    #[error("connection closed")]
    ConnectionClosed,

    /// The inbox was closed while a consumer was waiting on it.
    #[error("inbox closed")]
    InboxClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Failure reported by a message handler.
///
/// Handler failures are isolated at the dispatch boundary and never
/// propagate into the read loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handler failed: {message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error with a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<FrameError> for HandlerError {
    fn from(err: FrameError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

//! Pull-style delivery of received payloads.
//!
//! An [`Inbox`] is a cloneable FIFO that can be registered as a channel
//! handler, so a consumer on another thread can block on the next message
//! while the reader thread keeps draining the stream.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{FrameError, HandlerError, Result};
use crate::mux::Handler;

#[derive(Default)]
struct State {
    queue: VecDeque<Bytes>,
    closed: bool,
}

/// Thread-safe queue of payloads received on one or more channels.
#[derive(Clone, Default)]
pub struct Inbox {
    shared: Arc<(Mutex<State>, Condvar)>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a payload and wake one waiting consumer.
    ///
    /// Fails once the inbox is closed.
    pub fn push(&self, payload: impl Into<Bytes>) -> Result<()> {
        let (_, ready) = &*self.shared;
        let mut state = self.state();
        if state.closed {
            return Err(FrameError::InboxClosed);
        }
        state.queue.push_back(payload.into());
        ready.notify_one();
        Ok(())
    }

    /// Take the oldest payload without blocking.
    pub fn try_pop(&self) -> Option<Bytes> {
        self.state().queue.pop_front()
    }

    /// Block until a payload is available.
    ///
    /// Returns `Err(FrameError::InboxClosed)` once the inbox is closed and
    /// drained.
    pub fn wait_and_pop(&self) -> Result<Bytes> {
        let (_, ready) = &*self.shared;
        let mut state = self.state();
        loop {
            if let Some(payload) = state.queue.pop_front() {
                return Ok(payload);
            }
            if state.closed {
                return Err(FrameError::InboxClosed);
            }
            state = ready.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout` waiting for a payload.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing queued. A timeout
    /// too large to express as a deadline waits without one.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<Bytes>> {
        let deadline = Instant::now().checked_add(timeout);
        let (_, ready) = &*self.shared;
        let mut state = self.state();
        loop {
            if let Some(payload) = state.queue.pop_front() {
                return Ok(Some(payload));
            }
            if state.closed {
                return Err(FrameError::InboxClosed);
            }
            let Some(deadline) = deadline else {
                state = ready.wait(state).unwrap_or_else(PoisonError::into_inner);
                continue;
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            state = ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Refuse further payloads and wake every waiter.
    ///
    /// Payloads already queued can still be popped.
    pub fn close(&self) {
        let (_, ready) = &*self.shared;
        self.state().closed = true;
        ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().queue.is_empty()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Handler for Inbox {
    fn handle(&self, payload: &[u8]) -> std::result::Result<(), HandlerError> {
        self.push(Bytes::copy_from_slice(payload))
            .map_err(HandlerError::from)
    }
}

impl std::fmt::Debug for Inbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Inbox")
            .field("len", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}

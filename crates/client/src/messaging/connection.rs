//! Session lifecycle state.
//!
//! The state lives in an `AtomicU8` shared between the session task (writer)
//! and any number of observers (readers), so it can be read synchronously
//! from listener callbacks and from the send path.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle state of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket requested, handshake not complete
    Connecting,
    /// Handshake complete, frames flowing
    Open,
    /// Socket terminated; a reconnect may still be scheduled
    Closed,
}

impl SessionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            SessionState::Connecting => 0,
            SessionState::Open => 1,
            SessionState::Closed => 2,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            _ => SessionState::Closed,
        }
    }
}

/// Read-only view of a session's state.
#[derive(Debug, Clone)]
pub struct SessionStateObserver {
    state: Arc<AtomicU8>,
}

impl SessionStateObserver {
    pub fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    /// Get the current session state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }
}

/// Internal helper to update session state (used by the session task).
pub fn set_session_state(state_ref: &AtomicU8, new_state: SessionState) {
    state_ref.store(new_state.to_u8(), Ordering::SeqCst);
}

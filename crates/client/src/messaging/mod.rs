//! Listener registry and session state.
//!
//! - `ListenerRegistry`: event-key → ordered callbacks, fed by every room session
//! - `SessionState`: lifecycle of a single room socket

pub mod connection;
pub mod registry;

pub use connection::{set_session_state, SessionState, SessionStateObserver};
pub use registry::{listener, Listener, ListenerRegistry};

//! WebSocket transport for room sessions.
//!
//! - `session`: tokio-tungstenite socket task per room
//! - `core`: reconnect policy (runtime-agnostic)
//! - `message_builder`: outbound frame construction and stamping
//! - `shared`: frame parsing and rate-limit detection

mod core;
mod message_builder;
mod session;
mod shared;

pub use self::core::ReconnectPolicy;
pub use message_builder::{iso_timestamp, RoomMessageBuilder, REQUEST_ID_KEY};
pub use session::RoomSession;
pub use shared::DEFAULT_RETRY_AFTER_SECS;

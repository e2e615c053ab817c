//! Helpers shared by the session task: frame parsing and rate-limit detection.

use std::time::Duration;

use rayy_shared::{decode, CodecError, Message};
use tokio_tungstenite::tungstenite::http::{header::RETRY_AFTER, HeaderMap, StatusCode};
use tokio_tungstenite::tungstenite::Error as WsError;

/// Seconds to wait when a 429 carries no usable `retry-after` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Time allowed for the writer to flush `leave` and the close frame on shutdown.
pub const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

pub fn parse_room_message(text: &str) -> Result<Message, CodecError> {
    decode(text)
}

/// Retry interval if the handshake was rejected as rate limited.
pub fn rate_limit_retry_after(error: &WsError) -> Option<Duration> {
    match error {
        WsError::Http(response) => retry_after(response.status(), response.headers()),
        _ => None,
    }
}

fn retry_after(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let secs = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

    Some(Duration::from_secs(secs))
}

//! Client configuration.
//!
//! A `ClientConfig` is fixed for the lifetime of the `RayyClient` built from it.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default wait for a `list_users` reply.
pub const DEFAULT_PRESENCE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme `{0}` (expected ws or wss)")]
    UnsupportedScheme(String),

    #[error("client id must not be empty")]
    EmptyClientId,

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Reconnection behavior after a session closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Reconnects allowed before the session gives up
    pub max_attempts: u32,
    /// Delay multiplier in milliseconds; attempt `n` (0-based) waits `n * step_ms`
    pub step_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            step_ms: 3_000,
        }
    }
}

/// Construction-time settings for a `RayyClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    url: String,
    client_id: String,
    auto_reconnect: bool,
    reconnect: ReconnectConfig,
    presence_timeout: Duration,
}

impl ClientConfig {
    /// `url` is the backend base URL (e.g. `ws://localhost:8080`).
    pub fn new(url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: client_id.into(),
            auto_reconnect: false,
            reconnect: ReconnectConfig::default(),
            presence_timeout: Duration::from_millis(DEFAULT_PRESENCE_TIMEOUT_MS),
        }
    }

    /// Read `RAYY_URL`, `RAYY_CLIENT_ID` and the optional `RAYY_AUTO_RECONNECT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("RAYY_URL").map_err(|_| ConfigError::MissingEnv("RAYY_URL"))?;
        let client_id =
            std::env::var("RAYY_CLIENT_ID").map_err(|_| ConfigError::MissingEnv("RAYY_CLIENT_ID"))?;

        let auto_reconnect = match std::env::var("RAYY_AUTO_RECONNECT") {
            Ok(value) => parse_bool(&value).ok_or(ConfigError::InvalidEnv {
                name: "RAYY_AUTO_RECONNECT",
                value,
            })?,
            Err(_) => false,
        };

        let config = Self::new(url, client_id).with_auto_reconnect(auto_reconnect);
        config.validate()?;
        Ok(config)
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_presence_timeout(mut self, timeout: Duration) -> Self {
        self.presence_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        self.reconnect
    }

    pub fn presence_timeout(&self) -> Duration {
        self.presence_timeout
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Socket URL for `room`: `<url>/ws?room=<room>&client_id=<client_id>`.
    pub fn room_url(&self, room: &str) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.url)?;
        let path = format!("{}/ws", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("room", room)
            .append_pair("client_id", &self.client_id);
        Ok(url)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

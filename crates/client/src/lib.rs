//! Rayy Client - room messaging over WebSocket.
//!
//! One socket per subscribed room, a shared listener registry keyed by event
//! name, automatic `join`/`leave` announcements, optional reconnection, and a
//! presence query built on the event channel.
//!
//! ```rust,no_run
//! use rayy_client::{listener, ClientConfig, RayyClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RayyClient::new(
//!     ClientConfig::new("ws://localhost:8080", "alice").with_auto_reconnect(true),
//! )?;
//!
//! client.subscribe("lobby", listener(|msg| {
//!     println!("{:?} from {:?}", msg.action, msg.from);
//! }))?;
//!
//! client.send("lobby", "Hello!");
//! let users = client.presence("lobby").await?;
//! println!("in lobby: {users:?}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod messaging;
pub mod presence;
pub mod websocket;

pub use client::RayyClient;
pub use config::{ClientConfig, ConfigError, ReconnectConfig};
pub use messaging::{listener, Listener, ListenerRegistry, SessionState, SessionStateObserver};
pub use presence::PresenceError;
pub use rayy_shared::{Action, EventData, Message};

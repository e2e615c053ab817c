//! Rayy chat demo: two clients chatting in one room.

use std::time::Duration;

use rayy_client::{listener, Action, ClientConfig, Listener, Message, RayyClient};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ROOM: &str = "example_room";

fn chat_printer(name: &'static str) -> Listener {
    listener(move |msg: &Message| {
        let from = msg.from.as_deref().unwrap_or("unknown");
        match msg.action {
            Action::Message => {
                tracing::info!(
                    "[{name}] Received message from {from}: {}",
                    msg.content.as_deref().unwrap_or("")
                );
            }
            Action::Event => match msg.event_name() {
                Some("join") => tracing::info!("[{name}] {from} joined the room"),
                Some("leave") => tracing::info!("[{name}] {from} left the room"),
                Some("typing") => tracing::info!("[{name}] {from} is typing..."),
                _ => {}
            },
        }
    })
}

fn typing(is_typing: bool) -> Option<rayy_client::EventData> {
    match json!({ "isTyping": is_typing }) {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

async fn pause() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rayy_client=debug,rayy_chat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = std::env::var("RAYY_URL").unwrap_or_else(|_| "ws://localhost:8080".to_string());
    tracing::info!("Starting chat room example against {}", url);

    let alice = RayyClient::new(ClientConfig::new(&url, "alice").with_auto_reconnect(true))?;
    let bob = RayyClient::new(ClientConfig::new(&url, "bob").with_auto_reconnect(true))?;

    alice.subscribe(ROOM, chat_printer("Alice"))?;
    bob.subscribe(ROOM, chat_printer("Bob"))?;

    // Give both sockets time to open.
    pause().await;

    match alice.presence(ROOM).await {
        Ok(users) => tracing::info!("Users in room: {:?}", users),
        Err(e) => tracing::warn!("Presence query failed: {}", e),
    }

    tracing::info!("Starting chat simulation...");

    bob.event(ROOM, "typing", typing(true));
    pause().await;

    bob.send(ROOM, "Hello Alice!");
    pause().await;

    bob.event(ROOM, "typing", typing(false));
    pause().await;

    alice.event(ROOM, "typing", typing(true));
    pause().await;
    alice.send(ROOM, "Hi Bob! How are you?");
    alice.event(ROOM, "typing", typing(false));

    pause().await;

    alice.close().await;
    bob.close().await;

    tracing::info!("Chat simulation complete!");
    Ok(())
}

//! In-process room server for integration tests.
//!
//! Behaves like the real backend for the parts the client relies on: frames
//! from one member are relayed to the other members of the same room, and a
//! `list_users` event is answered to its sender with the room's client ids.
//! Tests can additionally inject raw frames, drop connections, refuse
//! handshakes with 429, or silence presence replies.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::ws::{Message as AxMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use rayy_client::{listener, Listener, Message};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

enum ServerFrame {
    Text(String),
    Close,
}

struct Member {
    conn_id: u64,
    client_id: String,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

#[derive(Default)]
struct ServerState {
    rooms: Mutex<HashMap<String, Vec<Member>>>,
    received: Mutex<Vec<Value>>,
    next_conn_id: AtomicU64,
    connections: AtomicUsize,
    rate_limited: AtomicUsize,
    retry_after_secs: AtomicU64,
    silent_presence: AtomicBool,
}

impl ServerState {
    fn rooms(&self) -> MutexGuard<'_, HashMap<String, Vec<Member>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_frame(&self, room: &str, conn_id: u64, text: &str) {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return;
        };
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value.clone());

        let rooms = self.rooms();
        let Some(members) = rooms.get(room) else {
            return;
        };

        if value.get("event").and_then(Value::as_str) == Some("list_users") {
            if self.silent_presence.load(Ordering::SeqCst) {
                return;
            }
            let mut users: Vec<String> = members.iter().map(|m| m.client_id.clone()).collect();
            users.dedup();
            let mut data = json!({ "users": users });
            if let Some(request_id) = value.pointer("/data/request_id") {
                data["request_id"] = request_id.clone();
            }
            let reply = json!({
                "action": "event",
                "room": room,
                "event": "list_users",
                "from": "server",
                "data": data,
            });
            if let Some(sender) = members.iter().find(|m| m.conn_id == conn_id) {
                let _ = sender.tx.send(ServerFrame::Text(reply.to_string()));
            }
            return;
        }

        for member in members.iter().filter(|m| m.conn_id != conn_id) {
            let _ = member.tx.send(ServerFrame::Text(text.to_string()));
        }
    }
}

/// Handle to a running mock server.
pub struct MockRoomServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockRoomServer {
    pub async fn spawn() -> Self {
        let state = Arc::new(ServerState::default());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");

        let router = axum::Router::new()
            .route("/ws", get(ws_handler))
            .with_state(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock server");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Successful WebSocket upgrades so far.
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Client ids currently connected to `room`.
    pub fn members(&self, room: &str) -> Vec<String> {
        self.state
            .rooms()
            .get(room)
            .map(|members| members.iter().map(|m| m.client_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Every frame received from clients, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.state
            .received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Frames received with `event == name`.
    pub fn received_events(&self, name: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|v| v.get("event").and_then(Value::as_str) == Some(name))
            .collect()
    }

    /// Push a raw text frame to every member of `room`.
    pub fn inject(&self, room: &str, text: &str) {
        if let Some(members) = self.state.rooms().get(room) {
            for member in members {
                let _ = member.tx.send(ServerFrame::Text(text.to_string()));
            }
        }
    }

    /// Close every connection in `room` from the server side.
    pub fn drop_all(&self, room: &str) {
        if let Some(members) = self.state.rooms().remove(room) {
            for member in members {
                let _ = member.tx.send(ServerFrame::Close);
            }
        }
    }

    /// Refuse the next `count` handshakes with 429 and `retry-after: secs`.
    pub fn rate_limit_next(&self, count: usize, retry_after_secs: u64) {
        self.state
            .retry_after_secs
            .store(retry_after_secs, Ordering::SeqCst);
        self.state.rate_limited.store(count, Ordering::SeqCst);
    }

    pub fn set_silent_presence(&self, silent: bool) {
        self.state.silent_presence.store(silent, Ordering::SeqCst);
    }
}

impl Drop for MockRoomServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    let limited = state
        .rate_limited
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if limited {
        let secs = state.retry_after_secs.load(Ordering::SeqCst);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, secs.to_string())],
        )
            .into_response();
    }

    let room = params.get("room").cloned().unwrap_or_default();
    let client_id = params.get("client_id").cloned().unwrap_or_default();
    ws.on_upgrade(move |socket| handle_socket(socket, state, room, client_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>, room: String, client_id: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    let conn_id = state.next_conn_id.fetch_add(1, Ordering::SeqCst);

    state.rooms().entry(room.clone()).or_default().push(Member {
        conn_id,
        client_id,
        tx,
    });
    state.connections.fetch_add(1, Ordering::SeqCst);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                ServerFrame::Text(text) => {
                    if sink.send(AxMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                ServerFrame::Close => {
                    let _ = sink.send(AxMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            AxMessage::Text(text) => state.on_frame(&room, conn_id, text.as_str()),
            AxMessage::Close(_) => break,
            _ => {}
        }
    }

    if let Some(members) = state.rooms().get_mut(&room) {
        members.retain(|m| m.conn_id != conn_id);
    }
    writer.abort();
}

/// A listener that forwards every frame it sees into a channel.
pub fn collector() -> (Listener, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let cb = listener(move |msg: &Message| {
        let _ = tx.send(msg.clone());
    });
    (cb, rx)
}

/// Wait for the first collected frame matching `predicate`.
pub async fn expect_message<F>(
    rx: &mut mpsc::UnboundedReceiver<Message>,
    timeout: Duration,
    mut predicate: F,
) -> Message
where
    F: FnMut(&Message) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            let msg = rx.recv().await.expect("collector channel open");
            if predicate(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("timed out waiting for message")
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A TCP endpoint that accepts connections and immediately drops them,
/// counting each accept. Every WebSocket handshake against it fails.
pub async fn spawn_dropping_endpoint() -> (String, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind dropping endpoint");
    let addr = listener.local_addr().expect("local addr");
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepts);

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    (format!("ws://{addr}"), accepts, handle)
}

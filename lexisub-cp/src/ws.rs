//! WebSocket connection manager
//!
//! Tracks live client connections keyed by connection id, fans server
//! messages out to every connection a user holds, and answers the small
//! client protocol (`ping`, `subscribe`). Sends are self-healing: a
//! connection whose channel is gone is dropped from the table during the
//! send, without affecting the user's other connections.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use lexisub_common::protocol::{ClientMessage, ServerMessage};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct ConnectionEntry {
    user_id: String,
    tx: mpsc::UnboundedSender<ServerMessage>,
    /// Task ids the client registered interest in
    subscriptions: HashSet<String>,
}

/// Registry of live WebSocket connections
pub struct ConnectionManager {
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and send the confirmation message.
    ///
    /// If even the confirmation cannot be delivered the registration is
    /// rolled back and `None` returned.
    pub fn connect(
        &self,
        user_id: &str,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Option<Uuid> {
        let conn_id = Uuid::new_v4();
        let confirm = ServerMessage::Connection {
            conn_id,
            user_id: user_id.to_string(),
        };
        if tx.send(confirm).is_err() {
            return None;
        }
        self.connections
            .write()
            .expect("connection lock poisoned")
            .insert(
                conn_id,
                ConnectionEntry {
                    user_id: user_id.to_string(),
                    tx,
                    subscriptions: HashSet::new(),
                },
            );
        info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connected");
        Some(conn_id)
    }

    /// Remove a connection. Safe to call for ids already gone.
    pub fn disconnect(&self, conn_id: Uuid) {
        let removed = self
            .connections
            .write()
            .expect("connection lock poisoned")
            .remove(&conn_id);
        if let Some(entry) = removed {
            info!(conn_id = %conn_id, user_id = %entry.user_id, "WebSocket disconnected");
        }
    }

    /// Deliver a message to every connection the user holds.
    ///
    /// Connections whose channel is closed are pruned; healthy connections
    /// are unaffected. Returns the number of successful deliveries.
    pub fn send_to_user(&self, user_id: &str, message: &ServerMessage) -> usize {
        let mut connections = self.connections.write().expect("connection lock poisoned");
        let mut dead = Vec::new();
        let mut delivered = 0;

        for (conn_id, entry) in connections.iter() {
            if entry.user_id != user_id {
                continue;
            }
            if entry.tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*conn_id);
            }
        }
        for conn_id in dead {
            connections.remove(&conn_id);
            warn!(conn_id = %conn_id, user_id = %user_id, "Pruned dead WebSocket connection");
        }
        delivered
    }

    /// Deliver a message to every connected client
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let mut connections = self.connections.write().expect("connection lock poisoned");
        let mut dead = Vec::new();
        let mut delivered = 0;

        for (conn_id, entry) in connections.iter() {
            if entry.tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*conn_id);
            }
        }
        for conn_id in dead {
            connections.remove(&conn_id);
        }
        delivered
    }

    /// Handle one inbound client message, producing the reply (if any)
    pub fn handle_message(&self, conn_id: Uuid, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::Ping => Some(ServerMessage::Pong),
            ClientMessage::Subscribe { task_id } => {
                if let Some(task_id) = &task_id {
                    let mut connections =
                        self.connections.write().expect("connection lock poisoned");
                    if let Some(entry) = connections.get_mut(&conn_id) {
                        entry.subscriptions.insert(task_id.clone());
                    }
                }
                Some(ServerMessage::Subscribed { task_id })
            }
            ClientMessage::Unknown => {
                debug!(conn_id = %conn_id, "Ignoring unrecognized client message");
                None
            }
        }
    }

    /// Deliver a reply to one specific connection
    fn send_to_conn(&self, conn_id: Uuid, message: &ServerMessage) -> bool {
        let connections = self.connections.read().expect("connection lock poisoned");
        connections
            .get(&conn_id)
            .map(|entry| entry.tx.send(message.clone()).is_ok())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .expect("connection lock poisoned")
            .len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: String,
}

/// WebSocket upgrade handler for `GET /ws?user_id=`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let Some(conn_id) = state.connections.connect(&user_id, tx) else {
        return;
    };

    // Writer task: drains the outbound channel onto the socket
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader loop: malformed input is ignored, never fatal
    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(_) => break,
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "Ignoring malformed client message");
                continue;
            }
        };

        if let Some(reply) = state.connections.handle_message(conn_id, client_msg) {
            // A failed send means the writer task died; tear down
            if !state.connections.send_to_conn(conn_id, &reply) {
                break;
            }
        }
    }

    state.connections.disconnect(conn_id);
    writer.abort();
}

//! WebSocket wire-protocol types
//!
//! Both directions use `{"type": ...}`-tagged JSON messages. Unrecognized
//! client message types deserialize into [`ClientMessage::Unknown`] and are
//! ignored by the connection manager; malformed input never closes the
//! channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages a client may send over the control channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keep-alive probe; answered with `pong`
    Ping,
    /// Interest registration for a task (bookkeeping only)
    Subscribe {
        #[serde(default)]
        task_id: Option<String>,
    },
    /// Any unrecognized message type
    #[serde(other)]
    Unknown,
}

/// Messages the service pushes to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection confirmation, sent immediately after registration
    Connection { conn_id: Uuid, user_id: String },
    /// Reply to `ping`
    Pong,
    /// Acknowledgement of `subscribe`
    Subscribed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },
    /// Live progress for one task
    TaskProgress {
        task_id: String,
        status: String,
        progress: u8,
        current_step: String,
        message: String,
    },
    /// Final payload, sent once a task completes
    TaskResult {
        task_id: String,
        result: serde_json::Value,
    },
}

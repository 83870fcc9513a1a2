use serde::{Deserialize, Serialize};

use crate::db::ChatMessage;

/// Frames a client sends over the WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom(String),
    SendMessage(SendMessage),
}

/// Frames the server pushes to room members.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent<'a> {
    ReceiveMessage(&'a ChatMessage),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    pub room: String,
    /// Ignored on sockets opened from a logged-in session.
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "file_path")]
    pub attachment_ref: Option<String>,
    #[serde(default, alias = "file_type")]
    pub attachment_type: Option<String>,
    /// Accepted for older clients; the server clock is authoritative.
    #[serde(default)]
    pub created_at: Option<serde_json::Value>,
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::error::ChatResult;

use super::Database;

/// A chat message as it is stored, broadcast and returned by history.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `None` only when persistence failed before broadcast.
    pub id: Option<i64>,
    #[sqlx(rename = "room_name")]
    pub room: String,
    pub sender_id: i64,
    pub username: String,
    pub content: String,
    pub attachment_ref: Option<String>,
    pub attachment_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room: String,
    pub sender_id: i64,
    pub username: String,
    pub content: String,
    pub attachment_ref: Option<String>,
    pub attachment_type: Option<String>,
    pub created_at: OffsetDateTime,
}

impl NewMessage {
    pub fn into_message(self, id: Option<i64>) -> ChatMessage {
        ChatMessage {
            id,
            room: self.room,
            sender_id: self.sender_id,
            username: self.username,
            content: self.content,
            attachment_ref: self.attachment_ref,
            attachment_type: self.attachment_type,
            created_at: self.created_at,
        }
    }
}

/// Server clock truncated to whole seconds, so the stored text sorts
/// chronologically. Ties are broken by id.
pub fn server_timestamp() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

/// Inserts the message and returns the id the store assigned to it.
pub async fn append(db: &Database, msg: &NewMessage) -> ChatResult<i64> {
    let done = sqlx::query(
        "INSERT INTO messages (sender_id, room_name, content, attachment_ref, attachment_type, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(msg.sender_id)
    .bind(&msg.room)
    .bind(&msg.content)
    .bind(&msg.attachment_ref)
    .bind(&msg.attachment_type)
    .bind(msg.created_at)
    .execute(db.pool()?)
    .await?;

    Ok(done.last_insert_rowid())
}

/// Every message of `room`, oldest first.
pub async fn history(db: &Database, room: &str) -> ChatResult<Vec<ChatMessage>> {
    Ok(sqlx::query_as::<_, ChatMessage>(
        r#"
SELECT m.id, m.room_name, m.sender_id, u.username, m.content, m.attachment_ref, m.attachment_type, m.created_at
FROM messages m
JOIN users u ON m.sender_id = u.id
WHERE m.room_name = ?
ORDER BY m.created_at ASC, m.id ASC
        "#,
    )
    .bind(room)
    .fetch_all(db.pool()?)
    .await?)
}

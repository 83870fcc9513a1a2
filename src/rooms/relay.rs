use crate::db::{messages, ChatMessage, Database, NewMessage};

use super::{events::{SendMessage, ServerEvent}, registry::RoomRegistry};

/// Persists `msg` and fans it out to everyone in its room.
///
/// Persistence is attempted first so the stored id can travel with the
/// broadcast, but a storage failure only gets logged: the message is still
/// delivered, with `id: null`. Returns `None` when the message is dropped as
/// malformed.
pub async fn relay(db: &Database, registry: &RoomRegistry, msg: SendMessage) -> Option<ChatMessage> {
    let room = msg.room.trim();
    let Some(sender_id) = msg.sender_id else {
        tracing::warn!("dropping message to {room:?} without a sender");
        return None;
    };
    if room.is_empty() {
        tracing::warn!("dropping message from {sender_id} without a room");
        return None;
    }
    if msg.content.is_empty() && msg.attachment_ref.is_none() {
        tracing::warn!("dropping empty message from {sender_id} to {room}");
        return None;
    }

    let new = NewMessage {
        room: room.to_owned(),
        sender_id,
        username: msg.username,
        content: msg.content,
        attachment_ref: msg.attachment_ref,
        attachment_type: msg.attachment_type,
        created_at: messages::server_timestamp(),
    };

    let id = match messages::append(db, &new).await {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::error!("could not persist message to {}: {e}", new.room);
            None
        }
    };
    let message = new.into_message(id);

    let frame = match serde_json::to_string(&ServerEvent::ReceiveMessage(&message)) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("could not encode message {:?}: {e}", message.id);
            return Some(message);
        }
    };
    let delivered = registry.broadcast(&message.room, &frame).await;
    tracing::debug!("message {:?} delivered to {delivered} in {}", message.id, message.room);

    Some(message)
}

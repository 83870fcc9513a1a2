mod events;
mod history;
pub mod registry;
pub mod relay;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use events::{ClientEvent, SendMessage, ServerEvent};
pub use registry::{ConnectionId, RoomRegistry, DEFAULT_ROOM};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages/{room}", get(history::history))
        .route("/ws", get(ws::room_ws))
}

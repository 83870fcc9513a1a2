use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    debug_handler,
    extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade},
    http::{header, HeaderMap},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tower_sessions::Session;

use crate::{
    config::Config,
    db::Database,
    error::{ChatError, ChatResult},
    session::{USERNAME, USER_ID},
    AppResult, AppState,
};

use super::{events::ClientEvent, registry::{ConnectionId, RoomRegistry, DEFAULT_ROOM}, relay::relay};

struct SocketContext {
    db: Database,
    registry: RoomRegistry,
    /// Set when the upgrade came from a logged-in session; overrides the
    /// sender fields of outgoing messages.
    identity: Option<(i64, String)>,
    ping_interval: Duration,
    ping_timeout: Duration,
}

#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    State(db): State<Database>,
    State(registry): State<RoomRegistry>,
    State(config): State<Arc<Config>>,
    session: Session,
    headers: HeaderMap,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    check_origin(&headers, &config.allowed_origin)?;

    let identity = match (
        session.get::<i64>(USER_ID).await?,
        session.get::<String>(USERNAME).await?,
    ) {
        (Some(id), Some(name)) => Some((id, name)),
        _ => None,
    };

    let ctx = SocketContext {
        db,
        registry,
        identity,
        ping_interval: config.ws_ping_interval,
        ping_timeout: config.ws_ping_timeout,
    };
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, ctx)))
}

/// Browsers always send `Origin` on a WebSocket handshake and CORS does not
/// cover upgrades, so a foreign page is turned away here. Non-browser clients
/// that omit the header are let through.
fn check_origin(headers: &HeaderMap, allowed: &str) -> ChatResult<()> {
    match headers.get(header::ORIGIN) {
        Some(origin) if origin.as_bytes() != allowed.as_bytes() => Err(ChatError::ForbiddenOrigin(
            String::from_utf8_lossy(origin.as_bytes()).into_owned(),
        )),
        _ => Ok(()),
    }
}

async fn handle_socket(socket: WebSocket, ctx: SocketContext) {
    let (id, mut rx) = ctx.registry.connect().await;
    tracing::info!("connection {id} opened");

    let (mut sender, mut receiver) = socket.split();

    let ping_interval = ctx.ping_interval;
    let mut forward_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        ping.tick().await;
        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // any inbound frame, pongs included, proves the peer is alive
    let idle_limit = ctx.ping_interval + ctx.ping_timeout;
    loop {
        let next = tokio::select! {
            next = tokio::time::timeout(idle_limit, receiver.next()) => next,
            _ = &mut forward_task => break,
        };

        let msg = match next {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                tracing::debug!("connection {id} errored: {e}");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::info!("connection {id} timed out");
                break;
            }
        };

        match msg {
            Message::Text(_) | Message::Binary(_) => handle_frame(&ctx, id, &msg.into_data()).await,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    ctx.registry.leave_all(id).await;
    forward_task.abort();
    tracing::info!("connection {id} closed");
}

async fn handle_frame(ctx: &SocketContext, id: ConnectionId, data: &[u8]) {
    let event = match serde_json::from_slice::<ClientEvent>(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("connection {id} sent an unreadable frame: {e}");
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom(room) => {
            let room = match room.trim() {
                "" => DEFAULT_ROOM,
                room => room,
            };
            ctx.registry.join(id, room).await;
            tracing::info!("connection {id} joined {room}");
            let counts = ctx.registry.room_counts().await;
            tracing::debug!("rooms: {counts:?}");
        }
        ClientEvent::SendMessage(mut msg) => {
            if let Some((user_id, username)) = &ctx.identity {
                msg.sender_id = Some(*user_id);
                msg.username = username.clone();
            }
            relay(&ctx.db, &ctx.registry, msg).await;
        }
    }
}

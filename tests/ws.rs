mod common;

use std::{net::SocketAddr, time::Duration};

use axum::body::Body;
use futures_util::{SinkExt, StreamExt};
use roomchat::{db::messages, RoomRegistry};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header, HeaderValue, Request, StatusCode},
        Error as WsError, Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

use common::{test_app, user, TestApp};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    connect_async(format!("ws://{addr}/ws")).await.unwrap().0
}

/// Opens `/ws` with extra handshake headers, e.g. `Origin` or `Cookie`.
async fn connect_with(addr: SocketAddr, headers: &[(header::HeaderName, &str)]) -> Result<Client, WsError> {
    let mut req = format!("ws://{addr}/ws").into_client_request().unwrap();
    for (name, value) in headers {
        req.headers_mut().insert(name.clone(), HeaderValue::from_str(value).unwrap());
    }
    connect_async(req).await.map(|(client, _)| client)
}

/// Logs in through the router and returns the `name=value` part of the session cookie.
async fn login_cookie(app: &TestApp, username: &str) -> String {
    let req = Request::post("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "username": username, "password": "password" }).to_string()))
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
    cookie.split(';').next().unwrap().to_owned()
}

async fn emit(client: &mut Client, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    client.send(Message::text(frame)).await.unwrap();
}

/// Next text frame, or `None` if nothing arrives in time.
async fn next_event(client: &mut Client, wait: Duration) -> Option<Value> {
    tokio::time::timeout(wait, async {
        while let Some(Ok(msg)) = client.next().await {
            if let Message::Text(text) = msg {
                return Some(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

async fn wait_for_members(registry: &RoomRegistry, room: &str, count: usize) {
    for _ in 0..200 {
        if registry.members_of(room).await.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{room} never reached {count} members");
}

#[tokio::test]
async fn broadcast_reaches_room_members_only() {
    let app = test_app().await;
    let alice = user(&app.state, "alice").await;
    let addr = serve(&app).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;
    emit(&mut a, "join_room", json!("public")).await;
    emit(&mut b, "join_room", json!("public")).await;
    emit(&mut c, "join_room", json!("games")).await;
    wait_for_members(&app.state.registry, "public", 2).await;
    wait_for_members(&app.state.registry, "games", 1).await;

    emit(
        &mut a,
        "send_message",
        json!({ "room": "public", "sender_id": alice, "username": "alice", "content": "hello" }),
    )
    .await;

    for client in [&mut a, &mut b] {
        let event = next_event(client, Duration::from_secs(5)).await.expect("broadcast");
        assert_eq!(event["event"], "receive_message");
        assert_eq!(event["data"]["content"], "hello");
        assert_eq!(event["data"]["sender_id"], alice);
        assert!(event["data"]["id"].is_i64());
    }
    assert!(next_event(&mut c, Duration::from_millis(300)).await.is_none());

    let stored = messages::history(&app.state.db, "public").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "hello");
}

#[tokio::test]
async fn disconnect_leaves_every_room() {
    let app = test_app().await;
    let alice = user(&app.state, "alice").await;
    let addr = serve(&app).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    emit(&mut a, "join_room", json!("public")).await;
    emit(&mut b, "join_room", json!("public")).await;
    wait_for_members(&app.state.registry, "public", 2).await;

    b.close(None).await.unwrap();
    wait_for_members(&app.state.registry, "public", 1).await;

    emit(
        &mut a,
        "send_message",
        json!({ "room": "public", "sender_id": alice, "username": "alice", "content": "still here?" }),
    )
    .await;
    let event = next_event(&mut a, Duration::from_secs(5)).await.expect("own broadcast");
    assert_eq!(event["data"]["content"], "still here?");
}

#[tokio::test]
async fn switching_rooms_stops_old_room_delivery() {
    let app = test_app().await;
    let alice = user(&app.state, "alice").await;
    let addr = serve(&app).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    emit(&mut a, "join_room", json!("public")).await;
    emit(&mut b, "join_room", json!("public")).await;
    wait_for_members(&app.state.registry, "public", 2).await;

    emit(&mut b, "join_room", json!("games")).await;
    wait_for_members(&app.state.registry, "public", 1).await;

    emit(
        &mut a,
        "send_message",
        json!({ "room": "public", "sender_id": alice, "username": "alice", "content": "anyone?" }),
    )
    .await;
    assert!(next_event(&mut a, Duration::from_secs(5)).await.is_some());
    assert!(next_event(&mut b, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn garbage_frames_do_not_drop_the_connection() {
    let app = test_app().await;
    let alice = user(&app.state, "alice").await;
    let addr = serve(&app).await;

    let mut a = connect(addr).await;
    a.send(Message::text("not json")).await.unwrap();
    emit(&mut a, "join_room", json!("public")).await;
    wait_for_members(&app.state.registry, "public", 1).await;

    emit(
        &mut a,
        "send_message",
        json!({ "room": "public", "sender_id": alice, "content": "ok" }),
    )
    .await;
    assert!(next_event(&mut a, Duration::from_secs(5)).await.is_some());
}

#[tokio::test]
async fn foreign_origin_is_refused_before_upgrade() {
    let app = test_app().await;
    let addr = serve(&app).await;

    let res = match connect_with(addr, &[(header::ORIGIN, "http://evil.example")]).await {
        Err(WsError::Http(res)) => res,
        Err(other) => panic!("expected an http rejection, got {other:?}"),
        Ok(_) => panic!("foreign origin was upgraded"),
    };
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let allowed = app.state.config.allowed_origin.clone();
    let mut a = connect_with(addr, &[(header::ORIGIN, allowed.as_str())]).await.unwrap();
    emit(&mut a, "join_room", json!("public")).await;
    wait_for_members(&app.state.registry, "public", 1).await;
}

#[tokio::test]
async fn session_identity_overrides_payload_sender() {
    let app = test_app().await;
    let alice = user(&app.state, "alice").await;
    let addr = serve(&app).await;

    let cookie = login_cookie(&app, "alice").await;
    let mut a = connect_with(addr, &[(header::COOKIE, cookie.as_str())]).await.unwrap();
    emit(&mut a, "join_room", json!("public")).await;
    wait_for_members(&app.state.registry, "public", 1).await;

    emit(
        &mut a,
        "send_message",
        json!({ "room": "public", "sender_id": 999, "username": "mallory", "content": "spoofed" }),
    )
    .await;
    let event = next_event(&mut a, Duration::from_secs(5)).await.expect("broadcast");
    assert_eq!(event["data"]["sender_id"], alice);
    assert_eq!(event["data"]["username"], "alice");
    assert!(event["data"]["id"].is_i64());

    // a logged-in socket does not need to name itself at all
    emit(&mut a, "send_message", json!({ "room": "public", "content": "plain" })).await;
    let event = next_event(&mut a, Duration::from_secs(5)).await.expect("broadcast");
    assert_eq!(event["data"]["content"], "plain");
    assert_eq!(event["data"]["sender_id"], alice);

    let stored = messages::history(&app.state.db, "public").await.unwrap();
    assert!(stored.iter().all(|m| m.sender_id == alice));
}

#[tokio::test]
async fn cookie_from_before_logout_carries_no_identity() {
    let app = test_app().await;
    user(&app.state, "alice").await;
    let bob = user(&app.state, "bob").await;
    let addr = serve(&app).await;

    let cookie = login_cookie(&app, "alice").await;
    let logout = Request::post("/logout").header(header::COOKIE, &cookie).body(Body::empty()).unwrap();
    let res = app.router.clone().oneshot(logout).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let mut a = connect_with(addr, &[(header::COOKIE, cookie.as_str())]).await.unwrap();
    emit(&mut a, "join_room", json!("public")).await;
    wait_for_members(&app.state.registry, "public", 1).await;

    emit(
        &mut a,
        "send_message",
        json!({ "room": "public", "sender_id": bob, "username": "bob", "content": "who am i" }),
    )
    .await;
    let event = next_event(&mut a, Duration::from_secs(5)).await.expect("broadcast");
    assert_eq!(event["data"]["sender_id"], bob);
    assert_eq!(event["data"]["username"], "bob");
}

#![allow(dead_code)]

use roomchat::{
    db::users,
    rooms::{relay::relay, SendMessage},
    AppState, Config, Database,
};
use tempfile::TempDir;

pub struct TestApp {
    pub state: AppState,
    pub router: axum::Router,
    // keeps the upload directory alive for the duration of the test
    pub _uploads: TempDir,
}

pub async fn test_app_with(db: Database) -> TestApp {
    test_app_configured(db, |_| {}).await
}

/// Like `test_app_with`, with a chance to adjust the config first.
pub async fn test_app_configured(db: Database, tweak: impl FnOnce(&mut Config)) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = Config {
        upload_dir: uploads.path().to_string_lossy().into_owned(),
        ..Config::default()
    };
    tweak(&mut config);

    let state = AppState::new(config, db);
    let router = roomchat::app(state.clone()).unwrap();
    TestApp { state, router, _uploads: uploads }
}

pub async fn test_app() -> TestApp {
    test_app_with(Database::open("sqlite::memory:", 1).await.unwrap()).await
}

pub fn message(room: &str, sender_id: i64, content: &str) -> SendMessage {
    SendMessage {
        room: room.to_owned(),
        sender_id: Some(sender_id),
        username: String::new(),
        content: content.to_owned(),
        attachment_ref: None,
        attachment_type: None,
        created_at: None,
    }
}

pub async fn user(state: &AppState, name: &str) -> i64 {
    users::register(&state.db, name, "password").await.unwrap()
}

pub async fn send(state: &AppState, msg: SendMessage) {
    relay(&state.db, &state.registry, msg).await;
}

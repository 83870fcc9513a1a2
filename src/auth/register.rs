use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{db::{users, Database}, AppResult, AppState};

use super::Credentials;

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(db): State<Database>,
    Json(Credentials { username, password }): Json<Credentials>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = users::register(&db, &username, &password).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "user registered", "id": id })),
    ))
}

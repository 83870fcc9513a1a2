use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    db::{users, Database},
    session::{USERNAME, USER_ID},
    AppResult, AppState,
};

use super::Credentials;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub id: i64,
    pub username: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db): State<Database>,
    session: Session,
    Json(Credentials { username, password }): Json<Credentials>,
) -> AppResult<Json<LoginResponse>> {
    let user = users::authenticate(&db, &username, &password).await?;

    session.cycle_id().await?;
    session.insert(USER_ID, user.id).await?;
    session.insert(USERNAME, &user.username).await?;

    tracing::info!("welcome {}#{}", user.username, user.id);

    Ok(Json(LoginResponse {
        id: user.id,
        username: user.username,
    }))
}

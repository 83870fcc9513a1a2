use axum::{debug_handler, extract::{Path, State}, Json};

use crate::{db::{messages, ChatMessage, Database}, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn history(
    State(db): State<Database>,
    Path(room): Path<String>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    if !db.is_available() {
        return Ok(Json(Vec::new()));
    }

    Ok(Json(messages::history(&db, &room).await?))
}

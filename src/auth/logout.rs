use axum::{debug_handler, http::StatusCode};
use tower_sessions::Session;

use crate::AppResult;

/// Deletes the session from the store, so a copied cookie stops working too.
#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<StatusCode> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

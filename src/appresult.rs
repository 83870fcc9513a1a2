use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::error::ChatError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.downcast_ref::<ChatError>() {
            Some(err) => (err.status_code(), err.public_message()),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned()),
        };

        if status.is_server_error() {
            tracing::error!("{}\n\n{}", self.0, self.0.backtrace());
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

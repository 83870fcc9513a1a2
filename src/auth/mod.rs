mod login;
mod logout;
mod register;

use axum::{routing::post, Router};
use serde::Deserialize;

use crate::AppState;

pub use login::LoginResponse;

#[derive(Debug, Deserialize)]
pub(crate) struct Credentials {
    #[serde(default)]
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
        .route("/logout", post(logout::logout))
}

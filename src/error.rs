use axum::{extract::multipart::MultipartError, http::StatusCode};
use tokio::task::JoinError;
use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("username is already taken")]
    DuplicateUsername,

    /// Unknown user and wrong password collapse into this one variant.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    #[error("no file provided")]
    NoFileProvided,

    /// Keeps the status axum picked, e.g. 413 for an oversized body.
    #[error("unreadable upload: {0}")]
    Upload(#[from] MultipartError),

    #[error("origin {0:?} is not allowed")]
    ForbiddenOrigin(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        use ChatError::*;
        match self {
            InvalidInput(_) | NoFileProvided => StatusCode::BAD_REQUEST,
            InvalidCredentials => StatusCode::UNAUTHORIZED,
            ForbiddenOrigin(_) => StatusCode::FORBIDDEN,
            Upload(e) => e.status(),
            DuplicateUsername | StorageUnavailable(_) | Hashing(_) | Io(_) | TaskFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text shown to the client. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        use ChatError::*;
        match self {
            InvalidInput(msg) => msg.clone(),
            DuplicateUsername => "registration failed, the username may be taken".to_owned(),
            InvalidCredentials => "invalid login credentials".to_owned(),
            NoFileProvided => "no file provided".to_owned(),
            Upload(e) => e.body_text(),
            ForbiddenOrigin(_) => "origin not allowed".to_owned(),
            StorageUnavailable(_) | Hashing(_) | Io(_) | TaskFailed(_) => {
                "internal server error".to_owned()
            }
        }
    }
}

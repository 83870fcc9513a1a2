//! Attachment uploads: multipart in, file on disk, locator out.

use std::path::{Path, PathBuf};

use axum::{
    debug_handler,
    extract::{Multipart, State},
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{error::{ChatError, ChatResult}, AppResult, AppState};

/// URL prefix the upload directory is served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAttachment {
    pub stored_name: String,
    pub mime_type: String,
}

impl StoredAttachment {
    /// Absolute locator clients embed in `attachment_ref`.
    pub fn reference(&self, base_url: &str) -> String {
        format!("{}{UPLOADS_PREFIX}/{}", base_url.trim_end_matches('/'), self.stored_name)
    }
}

/// Replaces everything outside `[A-Za-z0-9.]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect();
    if safe.is_empty() { "file".to_owned() } else { safe }
}

impl AttachmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> ChatResult<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub async fn store(&self, bytes: &[u8], original_name: &str, mime_type: &str) -> ChatResult<StoredAttachment> {
        self.ensure_dir().await?;

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let safe = sanitize_file_name(original_name);

        let mut stored_name = format!("{millis}-{safe}");
        let mut file = match self.create_new(&stored_name).await {
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                stored_name = format!("{millis}-{}-{safe}", Uuid::now_v7().simple());
                self.create_new(&stored_name).await?
            }
            other => other?,
        };
        file.write_all(bytes).await?;
        file.flush().await?;

        tracing::info!("stored upload {original_name:?} as {stored_name} ({} bytes)", bytes.len());

        Ok(StoredAttachment {
            stored_name,
            mime_type: mime_type.to_owned(),
        })
    }

    async fn create_new(&self, name: &str) -> std::io::Result<fs::File> {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.dir.join(name))
            .await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    format!("{scheme}://{host}")
}

#[debug_handler(state = AppState)]
pub(crate) async fn upload(
    State(attachments): State<AttachmentStore>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ChatError::Upload)?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let file_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(ChatError::Upload)?;

        let stored = attachments.store(&bytes, &file_name, &file_type).await?;
        return Ok(Json(UploadResponse {
            file_path: stored.reference(&base_url(&headers)),
            file_name,
            file_type: stored.mime_type,
        }));
    }

    Err(ChatError::NoFileProvided)?
}

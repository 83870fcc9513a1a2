pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod rooms;
pub mod session;
pub mod uploads;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use db::Database;
pub use rooms::RoomRegistry;
pub use uploads::AttachmentStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: Database,
    pub registry: RoomRegistry,
    pub attachments: AttachmentStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        Self {
            db,
            registry: RoomRegistry::new(),
            attachments: AttachmentStore::new(&config.upload_dir),
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();
    let upload_dir = state.attachments.dir().to_path_buf();

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.session_inactivity_minutes,
        )));

    let cors = CorsLayer::new()
        .allow_origin(config.allowed_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Ok(Router::new()
        .route("/", get(running))
        .merge(auth::router())
        .merge(rooms::router())
        .merge(uploads::router())
        .nest_service(uploads::UPLOADS_PREFIX, ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

async fn running() -> &'static str {
    "Server is running"
}

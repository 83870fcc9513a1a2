use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    /// Browser origin allowed by CORS. The WebSocket upgrade rejects any other
    /// `Origin` header with 403.
    pub allowed_origin: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub session_inactivity_minutes: i64,
    pub ws_ping_interval: Duration,
    pub ws_ping_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://roomchat.db".to_owned(),
            db_max_connections: 16,
            host: "0.0.0.0".to_owned(),
            port: 3001,
            allowed_origin: "http://localhost:5173".to_owned(),
            upload_dir: "uploads".to_owned(),
            max_upload_bytes: 25 * 1024 * 1024,
            session_inactivity_minutes: 60,
            ws_ping_interval: Duration::from_secs(25),
            ws_ping_timeout: Duration::from_secs(20),
        }
    }
}

impl Config {
    /// Reads the environment (and `.env`, if present) over the defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
        where
            T: FromStr,
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            match lookup(key) {
                Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
                None => Ok(default),
            }
        }

        Ok(Config {
            database_url: string("DATABASE_URL", defaults.database_url),
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            host: string("HOST", defaults.host),
            port: parsed(&lookup, "PORT", defaults.port)?,
            allowed_origin: string("ALLOWED_ORIGIN", defaults.allowed_origin),
            upload_dir: string("UPLOAD_DIR", defaults.upload_dir),
            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            session_inactivity_minutes: parsed(
                &lookup,
                "SESSION_INACTIVITY_MINUTES",
                defaults.session_inactivity_minutes,
            )?,
            ws_ping_interval: Duration::from_secs(parsed(
                &lookup,
                "WS_PING_INTERVAL_SECS",
                defaults.ws_ping_interval.as_secs(),
            )?),
            ws_ping_timeout: Duration::from_secs(parsed(
                &lookup,
                "WS_PING_TIMEOUT_SECS",
                defaults.ws_ping_timeout.as_secs(),
            )?),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub mod messages;
pub mod users;

use std::str::FromStr;

use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::error::{ChatError, ChatResult};

pub use messages::{ChatMessage, NewMessage};
pub use users::User;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Handle to the relational store.
///
/// The pool is optional: when the database cannot be opened at startup the
/// server keeps running, and every store operation reports
/// [`ChatError::StorageUnavailable`].
#[derive(Clone, Debug, Default)]
pub struct Database {
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Some(pool) }
    }

    pub fn unavailable() -> Self {
        Self { pool: None }
    }

    /// Opens the pool and applies migrations.
    pub async fn open(url: &str, max_connections: u32) -> ChatResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if url.contains(":memory:") {
            // every connection to :memory: is a distinct database
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| ChatError::StorageUnavailable(e.into()))?;

        Ok(Self::new(pool))
    }

    /// Like [`Database::open`], but logs the failure and falls back to an
    /// unavailable store instead of aborting.
    pub async fn open_or_unavailable(url: &str, max_connections: u32) -> Self {
        match Self::open(url, max_connections).await {
            Ok(db) => {
                tracing::info!("database ready at {url}");
                db
            }
            Err(e) => {
                tracing::error!("could not open database at {url}: {e}; running without storage");
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    pub fn pool(&self) -> ChatResult<&SqlitePool> {
        self.pool
            .as_ref()
            .ok_or(ChatError::StorageUnavailable(sqlx::Error::PoolClosed))
    }

    #[cfg(test)]
    pub(crate) async fn in_memory() -> Self {
        Self::open("sqlite::memory:", 1).await.unwrap()
    }
}

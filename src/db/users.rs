use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use serde::Serialize;
use sqlx::FromRow;

use crate::error::{ChatError, ChatResult};

use super::Database;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

fn hash_password(password: &str) -> ChatResult<String> {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| ChatError::Hashing(e.to_string()))?;

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ChatError::Hashing(e.to_string()))?
        .to_string())
}

fn verify_password(password: &str, stored: &str) -> ChatResult<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| ChatError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

async fn blocking<T, F>(f: F) -> ChatResult<T>
where
    F: FnOnce() -> ChatResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Creates a user and returns its id.
pub async fn register(db: &Database, username: &str, password: &str) -> ChatResult<i64> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ChatError::InvalidInput("username and password are required".to_owned()));
    }
    let pool = db.pool()?;

    let password = password.to_owned();
    let password_hash = blocking(move || hash_password(&password)).await?;

    let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
        .bind(username)
        .bind(&password_hash)
        .execute(pool)
        .await;

    match result {
        Ok(done) => {
            tracing::info!("registered {username}");
            Ok(done.last_insert_rowid())
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(ChatError::DuplicateUsername),
        Err(e) => Err(e.into()),
    }
}

pub async fn authenticate(db: &Database, username: &str, password: &str) -> ChatResult<User> {
    let pool = db.pool()?;

    let Some(user) = sqlx::query_as::<_, User>("SELECT id, username, password_hash FROM users WHERE username = ?")
        .bind(username.trim())
        .fetch_optional(pool)
        .await?
    else {
        return Err(ChatError::InvalidCredentials);
    };

    let password = password.to_owned();
    let stored = user.password_hash.clone();
    if !blocking(move || verify_password(&password, &stored)).await? {
        return Err(ChatError::InvalidCredentials);
    }

    Ok(user)
}

//! Record store for users and prediction history.
//!
//! Handlers only see the [`UserStore`] and [`PredictionStore`] traits; the
//! concrete backend is picked at startup from configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;
pub mod pg;
mod repo_types;

pub use memory::MemoryStore;
pub use pg::PgStore;
pub use repo_types::{NewPrediction, NewUser, PredictionKind, PredictionRecord};

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with [`StoreError::DuplicateEmail`] if the email exists.
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn insert(&self, record: NewPrediction) -> StoreResult<PredictionRecord>;

    /// All records attributed to `user_id`, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<PredictionRecord>>;
}

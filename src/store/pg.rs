use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    repo_types::PredictionRow, NewPrediction, NewUser, PredictionRecord, PredictionStore,
    StoreError, StoreResult, User, UserStore,
};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, username, password_hash, created_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, username, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl PredictionStore for PgStore {
    async fn insert(&self, record: NewPrediction) -> StoreResult<PredictionRecord> {
        let row = sqlx::query_as::<_, PredictionRow>(
            r#"
            INSERT INTO predictions (user_id, kind, input, filename, prediction)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, kind, input, filename, prediction, created_at
            "#,
        )
        .bind(record.user_id)
        .bind(record.kind.as_str())
        .bind(record.input)
        .bind(record.filename)
        .bind(record.prediction)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT id, user_id, kind, input, filename, prediction, created_at
            FROM predictions
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

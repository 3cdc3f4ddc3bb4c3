use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    NewPrediction, NewUser, PredictionRecord, PredictionStore, StoreError, StoreResult, User,
    UserStore,
};

/// Process-local store with the same contract as [`super::PgStore`].
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    predictions: RwLock<Vec<PredictionRecord>>, // insertion order
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn prediction_count(&self) -> usize {
        self.predictions.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn insert(&self, record: NewPrediction) -> StoreResult<PredictionRecord> {
        let stored = PredictionRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            kind: record.kind,
            input: record.input,
            filename: record.filename,
            prediction: record.prediction,
            created_at: OffsetDateTime::now_utc(),
        };
        self.predictions.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_by_user(&self, user_id: Uuid) -> StoreResult<Vec<PredictionRecord>> {
        let all = self.predictions.read().await;
        // Newest insert first so equal timestamps still come out newest first.
        let mut out: Vec<PredictionRecord> = all
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PredictionKind;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            username: "someone".into(),
            password_hash: "hash".into(),
        }
    }

    fn symptom(user_id: Uuid, label: &str) -> NewPrediction {
        NewPrediction {
            user_id,
            kind: PredictionKind::Symptom,
            input: Some(serde_json::json!({ "Fever": 1 })),
            filename: None,
            prediction: label.into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryStore::new();
        store.create(new_user("a@x.com")).await.expect("first insert");
        let err = store.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn find_by_email_and_id() {
        let store = MemoryStore::new();
        let user = store.create(new_user("b@x.com")).await.unwrap();
        let by_email = store.find_by_email("b@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "b@x.com");
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_user_filters_and_orders_newest_first() {
        let store = MemoryStore::new();
        let u = Uuid::new_v4();
        let v = Uuid::new_v4();
        for i in 0..5 {
            store.insert(symptom(u, &format!("u{i}"))).await.unwrap();
            store.insert(symptom(v, &format!("v{i}"))).await.unwrap();
        }

        let mine = store.list_by_user(u).await.unwrap();
        assert_eq!(mine.len(), 5);
        assert!(mine.iter().all(|r| r.user_id == u));
        assert!(mine.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(mine[0].prediction, "u4");
        assert_eq!(mine[4].prediction, "u0");
    }
}

use crate::auth::TokenService;
use crate::config::{AppConfig, StoreBackend};
use crate::predict::{Classifier, NearestNeighbourModel};
use crate::store::{MemoryStore, PgStore, PredictionStore, UserStore};
use anyhow::Context;
use std::sync::Arc;

/// Everything handlers need, built once at startup and read-only afterwards.
/// Absent collaborators are `None`; each route decides how to degrade.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: TokenService,
    pub users: Option<Arc<dyn UserStore>>,
    pub predictions: Option<Arc<dyn PredictionStore>>,
    pub classifier: Option<Arc<dyn Classifier>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, predictions): (Option<Arc<dyn UserStore>>, Option<Arc<dyn PredictionStore>>) =
            match config.store_backend {
                StoreBackend::Memory => {
                    tracing::warn!("using in-memory store; data is lost on restart");
                    let store = Arc::new(MemoryStore::new());
                    (
                        Some(store.clone() as Arc<dyn UserStore>),
                        Some(store as Arc<dyn PredictionStore>),
                    )
                }
                StoreBackend::Postgres => match connect_postgres(&config).await {
                    Ok(store) => {
                        let store = Arc::new(store);
                        (
                            Some(store.clone() as Arc<dyn UserStore>),
                            Some(store as Arc<dyn PredictionStore>),
                        )
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "record store unavailable; continuing without it");
                        (None, None)
                    }
                },
            };

        let classifier = match NearestNeighbourModel::load(&config.model_path) {
            Ok(model) => {
                tracing::info!(path = %config.model_path, "model loaded");
                Some(Arc::new(model) as Arc<dyn Classifier>)
            }
            Err(e) => {
                tracing::warn!(error = ?e, "model not loaded; /predict will fail");
                None
            }
        };

        Ok(Self::from_parts(config, users, predictions, classifier))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Option<Arc<dyn UserStore>>,
        predictions: Option<Arc<dyn PredictionStore>>,
        classifier: Option<Arc<dyn Classifier>>,
    ) -> Self {
        Self {
            tokens: TokenService::new(&config.jwt),
            config,
            users,
            predictions,
            classifier,
        }
    }

    /// In-memory store and a classifier that always answers "Flu".
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::for_tests_with_store(Arc::new(MemoryStore::new()))
    }

    #[cfg(test)]
    pub fn for_tests_with_store(store: Arc<MemoryStore>) -> Self {
        struct FixedClassifier;
        impl Classifier for FixedClassifier {
            fn predict(&self, _features: &crate::predict::symptoms::FeatureVector) -> anyhow::Result<String> {
                Ok("Flu".into())
            }
        }

        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Some(store.clone() as Arc<dyn UserStore>),
            Some(store as Arc<dyn PredictionStore>),
            Some(Arc::new(FixedClassifier) as Arc<dyn Classifier>),
        )
    }
}

async fn connect_postgres(config: &AppConfig) -> anyhow::Result<PgStore> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set for the postgres store")?;
    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await
        .context("connect to database")?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }
    Ok(PgStore::new(db))
}

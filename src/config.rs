use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Which record store backs users and prediction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub jwt: JwtConfig,
    pub model_path: String,
    pub max_upload_bytes: usize,
}

const DEFAULT_TTL_MINUTES: i64 = 60 * 24;
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

/// Token lifetime in minutes; must be positive and at most a year.
fn parse_ttl_minutes(raw: Option<&str>) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TTL_MINUTES);
    };
    let minutes: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("JWT_TTL_MINUTES is not an integer: {raw:?}"))?;
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {minutes}");
    }
    Ok(minutes)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("unknown STORE_BACKEND {other:?}"),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "symptom-triage".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "symptom-triage-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref())?,
        };
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            store_backend,
            jwt,
            model_path: std::env::var("MODEL_PATH").unwrap_or_else(|_| "models/model.json".into()),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(10 * 1024 * 1024),
        })
    }

    /// Configuration used by unit tests: in-memory store, short fixed secret.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            store_backend: StoreBackend::Memory,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24,
            },
            model_path: "models/model.json".into(),
            max_upload_bytes: 1024 * 1024,
        }
    }
}

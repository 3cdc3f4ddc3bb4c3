use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Which prediction path produced a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
    Symptom,
    Image,
}

impl PredictionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionKind::Symptom => "symptom",
            PredictionKind::Image => "image",
        }
    }

    /// Records written before `kind` existed are symptom records.
    pub fn from_db(raw: Option<&str>) -> Self {
        match raw {
            Some("image") => PredictionKind::Image,
            _ => PredictionKind::Symptom,
        }
    }
}

/// Fields needed to register a user; id and timestamp come from the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub user_id: Uuid,
    pub kind: PredictionKind,
    pub input: Option<serde_json::Value>, // symptom payload as submitted
    pub filename: Option<String>,         // image uploads keep only the name
    pub prediction: String,
}

/// Stored prediction.
#[derive(Debug, Clone)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: PredictionKind,
    pub input: Option<serde_json::Value>,
    pub filename: Option<String>,
    pub prediction: String,
    pub created_at: OffsetDateTime,
}

/// Raw `predictions` row; `kind` is free text in the table.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PredictionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: Option<String>,
    pub input: Option<serde_json::Value>,
    pub filename: Option<String>,
    pub prediction: String,
    pub created_at: OffsetDateTime,
}

impl From<PredictionRow> for PredictionRecord {
    fn from(r: PredictionRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            kind: PredictionKind::from_db(r.kind.as_deref()),
            input: r.input,
            filename: r.filename,
            prediction: r.prediction,
            created_at: r.created_at,
        }
    }
}

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::{PredictionKind, PredictionRecord};

/// One history entry. Symptom entries carry `input`, image entries `filename`.
#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub kind: PredictionKind,
    pub prediction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl From<PredictionRecord> for HistoryItem {
    fn from(r: PredictionRecord) -> Self {
        let (input, filename) = match r.kind {
            PredictionKind::Symptom => (
                Some(r.input.unwrap_or_else(|| serde_json::json!({}))),
                None,
            ),
            PredictionKind::Image => (None, Some(r.filename.unwrap_or_default())),
        };
        Self {
            id: r.id,
            timestamp: r.created_at,
            kind: r.kind,
            prediction: r.prediction,
            input,
            filename,
        }
    }
}

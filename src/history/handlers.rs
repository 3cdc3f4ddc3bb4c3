use axum::{extract::State, routing::get, Json, Router};
use tracing::{error, instrument, warn};

use super::dto::HistoryItem;
use crate::{auth::CurrentUser, state::AppState};

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/history", get(get_history))
}

/// Caller's predictions, newest first. Never fails: a missing or broken
/// store reads as an empty history.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<HistoryItem>> {
    let Some(store) = state.predictions.as_ref() else {
        warn!("prediction store unavailable; returning empty history");
        return Json(Vec::new());
    };

    match store.list_by_user(user.id).await {
        Ok(records) => Json(records.into_iter().map(HistoryItem::from).collect()),
        Err(e) => {
            error!(error = %e, "failed to read history");
            Json(Vec::new())
        }
    }
}

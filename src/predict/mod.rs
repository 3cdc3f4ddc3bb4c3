//! Symptom classification and the image fallback.

mod dto;
pub mod classifier;
pub mod handlers;
pub mod image;
pub mod symptoms;

use crate::state::AppState;
use axum::Router;

pub use classifier::{Classifier, NearestNeighbourModel};

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    handlers::predict_routes(max_upload_bytes)
}

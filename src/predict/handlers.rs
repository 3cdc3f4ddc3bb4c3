use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use tracing::{debug, error, info, instrument, warn};

use super::{
    dto::{ImagePredictionResponse, SymptomPredictionResponse},
    image::label_for_image,
    symptoms::parse_symptoms,
};
use crate::{
    auth::CurrentUser,
    error::{AppError, AppResult, InputError, ServiceError},
    state::AppState,
    store::{NewPrediction, PredictionKind},
};

pub fn predict_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict_symptoms))
        .route(
            "/predict-image",
            post(predict_image).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

/// Appends a history record. Failure never fails the request; the return
/// value says whether the record was written.
pub(crate) async fn record_prediction(state: &AppState, record: NewPrediction) -> bool {
    let Some(store) = state.predictions.as_ref() else {
        warn!(user_id = %record.user_id, "prediction store unavailable; history not recorded");
        return false;
    };
    match store.insert(record).await {
        Ok(saved) => {
            debug!(record_id = %saved.id, kind = saved.kind.as_str(), "prediction recorded");
            true
        }
        Err(e) => {
            error!(error = %e, "failed to record prediction");
            false
        }
    }
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn predict_symptoms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<Json<SymptomPredictionResponse>> {
    let classifier = state
        .classifier
        .clone()
        .ok_or(ServiceError::ModelUnavailable)?;

    let Json(payload) = payload?;
    let features = parse_symptoms(&payload)?;
    let prediction = classifier.predict(&features)?;

    let recorded = record_prediction(
        &state,
        NewPrediction {
            user_id: user.id,
            kind: PredictionKind::Symptom,
            input: Some(payload.clone()),
            filename: None,
            prediction: prediction.clone(),
        },
    )
    .await;

    info!(prediction = %prediction, recorded, "symptom prediction");
    Ok(Json(SymptomPredictionResponse {
        prediction,
        features: payload,
        recorded,
    }))
}

/// Oversized uploads hit `DefaultBodyLimit` while the body is streamed.
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(error = %e, "image upload over size limit");
        return InputError::PayloadTooLarge.into();
    }
    debug!(error = %e, "malformed multipart body");
    InputError::InvalidInput("Malformed multipart body".into()).into()
}

/// First `image` part of the form as (filename, bytes).
async fn read_image_part(mut mp: Multipart) -> AppResult<(String, Bytes)> {
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().map(str::to_string).unwrap_or_default();
        let data = field.bytes().await.map_err(multipart_error)?;
        if filename.is_empty() || data.is_empty() {
            return Err(InputError::NoFile.into());
        }
        return Ok((filename, data));
    }
    Err(InputError::NoFile.into())
}

#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn predict_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ImagePredictionResponse>> {
    let mp = mp.map_err(|e| {
        debug!(error = %e, "not a multipart request");
        InputError::NoFile
    })?;
    let (filename, data) = read_image_part(mp).await?;
    let prediction = label_for_image(&data);

    let recorded = record_prediction(
        &state,
        NewPrediction {
            user_id: user.id,
            kind: PredictionKind::Image,
            input: None,
            filename: Some(filename.clone()),
            prediction: prediction.to_string(),
        },
    )
    .await;

    info!(%prediction, %filename, bytes = data.len(), recorded, "image prediction");
    Ok(Json(ImagePredictionResponse {
        prediction,
        message: "Image analyzed successfully",
        recorded,
    }))
}

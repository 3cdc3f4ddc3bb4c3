use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Malformed or missing client-supplied data. 400, or 413 for an upload
/// over the size limit.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid value for symptom {0}")]
    InvalidFeature(String),

    #[error("No image file provided")]
    NoFile,

    #[error("Uploaded file is too large")]
    PayloadTooLarge,
}

/// Missing, invalid or unresolvable credentials. Always 401.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token is missing")]
    Missing,

    #[error("Token is malformed")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Token is invalid")]
    Invalid,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid email or password")]
    InvalidCredentials,
}

/// A dependency the request needs is not available. Always 500.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Model not loaded")]
    ModelUnavailable,

    #[error("Record store unavailable")]
    StoreUnavailable,

    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Service(ServiceError::Internal(e))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        AppError::Input(InputError::InvalidInput(
            "Request body must be a JSON object".into(),
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Input(InputError::PayloadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Input(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Input(InputError::InvalidInput(_)) => "INVALID_INPUT",
            AppError::Input(InputError::EmailTaken) => "EMAIL_TAKEN",
            AppError::Input(InputError::InvalidFeature(_)) => "INVALID_FEATURE",
            AppError::Input(InputError::NoFile) => "NO_FILE",
            AppError::Input(InputError::PayloadTooLarge) => "PAYLOAD_TOO_LARGE",
            AppError::Auth(AuthError::Missing) => "TOKEN_MISSING",
            AppError::Auth(AuthError::Malformed | AuthError::Expired | AuthError::Invalid) => {
                "TOKEN_INVALID"
            }
            AppError::Auth(AuthError::UserNotFound) => "USER_NOT_FOUND",
            AppError::Auth(AuthError::InvalidCredentials) => "INVALID_CREDENTIALS",
            AppError::Service(ServiceError::ModelUnavailable) => "MODEL_UNAVAILABLE",
            AppError::Service(ServiceError::StoreUnavailable) => "STORE_UNAVAILABLE",
            AppError::Service(ServiceError::Internal(_)) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Internal causes stay in the logs.
        if let AppError::Service(ServiceError::Internal(e)) = &self {
            tracing::error!(error = ?e, "internal error");
        }
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
        password::{hash_password, verify_dummy_password, verify_password},
    },
    error::{AppResult, AuthError, InputError, ServiceError},
    state::AppState,
    store::{NewUser, StoreError},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, non-empty value of an optional field.
fn required(field: Option<String>) -> Option<String> {
    field
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(payload) = payload?;
    let (Some(email), Some(username), Some(password)) = (
        required(payload.email),
        required(payload.username),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        warn!("register with missing fields");
        return Err(InputError::InvalidInput(
            "Email, username, and password are required".into(),
        )
        .into());
    };
    let email = email.to_lowercase();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(InputError::InvalidInput("Invalid email".into()).into());
    }

    let users = state.users.as_ref().ok_or(ServiceError::StoreUnavailable)?;

    // Ensure email is not taken
    if users.find_by_email(&email).await.map_err(anyhow::Error::from)?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(InputError::EmailTaken.into());
    }

    let password_hash = hash_password(&password)?;
    let user = match users
        .create(NewUser {
            email,
            username,
            password_hash,
        })
        .await
    {
        Ok(u) => u,
        Err(StoreError::DuplicateEmail) => return Err(InputError::EmailTaken.into()),
        Err(e) => return Err(anyhow::Error::from(e).into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
        }),
    ))
}

/// Unknown email and wrong password produce the same error.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(payload) = payload?;
    let (Some(email), Some(password)) = (
        required(payload.email),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(InputError::InvalidInput("Email and password are required".into()).into());
    };
    let email = email.to_lowercase();

    let users = state.users.as_ref().ok_or(ServiceError::StoreUnavailable)?;

    let Some(user) = users.find_by_email(&email).await.map_err(anyhow::Error::from)? else {
        warn!(email = %email, "login unknown email");
        verify_dummy_password(&password);
        return Err(AuthError::InvalidCredentials.into());
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.tokens.issue(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        token,
        email: user.email,
        username: user.username,
        message: "Login successful",
    }))
}

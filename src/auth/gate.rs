use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::jwt::TokenService;
use crate::{
    error::{AppError, AppResult, AuthError, ServiceError},
    state::AppState,
    store::{User, UserStore},
};

/// Pulls `<token>` out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves the caller of a request to a user record.
pub async fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenService,
    users: Option<&dyn UserStore>,
) -> AppResult<User> {
    let token = bearer_token(headers).ok_or_else(|| {
        debug!("request without bearer token");
        AuthError::Missing
    })?;

    let user_id = tokens.verify(token).map_err(|e| {
        warn!(reason = %e, "rejected bearer token");
        AuthError::Invalid
    })?;

    let users = users.ok_or(ServiceError::StoreUnavailable)?;
    let user = users
        .find_by_id(user_id)
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?
        .ok_or_else(|| {
            warn!(%user_id, "token for unknown user");
            AuthError::UserNotFound
        })?;
    Ok(user)
}

/// Middleware guarding protected routes. On success the resolved [`User`]
/// is placed in the request extensions; otherwise the inner handler never runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(req.headers(), &state.tokens, state.users.as_deref()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// The authenticated caller, as resolved by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Auth(AuthError::Missing))
    }
}

use crate::state::AppState;
use axum::Router;

mod dto;
pub mod gate;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use gate::{require_auth, CurrentUser};
pub use jwt::TokenService;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}

use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use dto::MessageResponse;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}

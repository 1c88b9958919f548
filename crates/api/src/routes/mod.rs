//! Route tree for the API.

use axum::Router;

use crate::state::AppState;

pub mod clusters;
pub mod health;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/clusters", clusters::router())
}

pub mod health;
pub mod indexnow;
pub mod key_file;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(indexnow::router())
        .merge(key_file::router())
        .with_state(state)
}

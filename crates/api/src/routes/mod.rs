pub mod health;
pub mod messages;
pub mod notify;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notify::router())
        .merge(messages::router())
        .with_state(state)
}

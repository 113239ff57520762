//! Message status lookup.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::Message;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/messages/{id}", get(get_message))
}

/// GET /messages/:id - Current delivery status of one message.
async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let message = state.system.get_message(id).await?;
    Ok(Json(message))
}

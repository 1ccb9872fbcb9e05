use crate::state::AppState;
use crate::web::api::internal_error;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// GET /api/healthchecker -- round-trips a trivial query to the database
#[tracing::instrument(skip(state))]
pub async fn healthchecker(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match rolodex_db::ping(&state.pool).await {
        Ok(()) => Json(json!({"message": "Healthy"})).into_response(),
        Err(e) => internal_error("Database health check failed", &e),
    }
}

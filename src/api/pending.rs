//! Operator decisions on pending confirmations

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use super::{ApiError, ApiState};
use crate::Error;
use crate::gateway::ExecutionResult;
use crate::hitl::PendingConfirmation;

#[derive(Serialize)]
pub struct PendingList {
    pub pending: Vec<PendingConfirmation>,
    pub max_pending: usize,
}

async fn list(State(state): State<Arc<ApiState>>) -> Json<PendingList> {
    Json(PendingList {
        pending: state.orchestrator.pending(),
        max_pending: state.orchestrator.max_pending(),
    })
}

async fn get_one(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PendingConfirmation>, ApiError> {
    state
        .orchestrator
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError(Error::NotFound(id.to_string())))
}

/// Confirm and execute; a failed execution maps to 502, 503 or 504
async fn confirm(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let result = state.orchestrator.confirm(id).await?.into_result()?;
    Ok(Json(result))
}

async fn cancel(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.cancel(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build the pending-confirmation router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(get_one))
        .route("/{id}/confirm", post(confirm))
        .route("/{id}/cancel", post(cancel))
        .with_state(state)
}

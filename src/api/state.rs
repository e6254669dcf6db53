//! Operator controls: AI kill switch and confidence thresholds

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::hitl::{DisabledMode, Thresholds};

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub ai_enabled: bool,
    pub thresholds: Thresholds,
    pub disabled_mode: DisabledMode,
}

/// Partial update; omitted fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct StateUpdate {
    #[serde(default)]
    pub ai_enabled: Option<bool>,
    #[serde(default)]
    pub low_threshold: Option<f64>,
    #[serde(default)]
    pub high_threshold: Option<f64>,
}

fn snapshot(state: &ApiState) -> StateResponse {
    let policy = state.orchestrator.policy();
    StateResponse {
        ai_enabled: policy.ai_enabled(),
        thresholds: policy.thresholds(),
        disabled_mode: policy.disabled_mode(),
    }
}

async fn get_state(State(state): State<Arc<ApiState>>) -> Json<StateResponse> {
    Json(snapshot(&state))
}

async fn set_state(
    State(state): State<Arc<ApiState>>,
    Json(update): Json<StateUpdate>,
) -> Result<Json<StateResponse>, ApiError> {
    let orchestrator = &state.orchestrator;

    // Validate before touching anything so a bad request changes nothing
    let thresholds = if update.low_threshold.is_some() || update.high_threshold.is_some() {
        let current = orchestrator.thresholds();
        let low = update.low_threshold.unwrap_or(current.low);
        let high = update.high_threshold.unwrap_or(current.high);
        Some(Thresholds::new(low, high).map_err(|e| ApiError::bad_request(e.to_string()))?)
    } else {
        None
    };

    if let Some(thresholds) = thresholds {
        orchestrator.set_thresholds(thresholds);
    }
    if let Some(enabled) = update.ai_enabled {
        orchestrator.set_ai_enabled(enabled);
    }

    Ok(Json(snapshot(&state)))
}

/// Build the operator state router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(get_state).post(set_state))
        .with_state(state)
}

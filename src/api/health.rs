//! Health, readiness and status endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::gateway::BackendHealth;
use crate::hitl::{DisabledMode, Thresholds};
use crate::intake::AdapterNames;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub backend: CheckResult,
    pub song_catalog: CheckResult,
}

/// Result of a single check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }

    fn unknown() -> Self {
        Self {
            status: "unknown",
            message: Some("no backend call yet".to_string()),
        }
    }

    fn unavailable() -> Self {
        Self {
            status: "unavailable",
            message: Some("not configured".to_string()),
        }
    }

    fn passes(&self) -> bool {
        self.status != "fail"
    }
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe: fails while the presentation backend is unreachable
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let backend = check_backend(&state.orchestrator.backend_health());
    let song_catalog = check_song_catalog(&state);

    let all_ok = backend.passes() && song_catalog.passes();
    let (http_status, status) = if all_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks {
                backend,
                song_catalog,
            },
        }),
    )
}

fn check_backend(health: &BackendHealth) -> CheckResult {
    match health.reachable {
        Some(true) => CheckResult::ok(),
        Some(false) => CheckResult::fail(
            health
                .last_error
                .clone()
                .unwrap_or_else(|| "backend unreachable".to_string()),
        ),
        None => CheckResult::unknown(),
    }
}

fn check_song_catalog(state: &ApiState) -> CheckResult {
    match &state.songs {
        Some(songs) => match songs.count() {
            Ok(_) => CheckResult::ok(),
            Err(e) => CheckResult::fail(e.to_string()),
        },
        None => CheckResult::unavailable(),
    }
}

/// Operator-facing system status
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub ai_enabled: bool,
    pub thresholds: Thresholds,
    pub disabled_mode: DisabledMode,
    pub pending: usize,
    pub max_pending: usize,
    pub adapters: AdapterNames,
    pub backend: BackendHealth,
    pub subscribers: usize,
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let orchestrator = &state.orchestrator;
    let policy = orchestrator.policy();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        ai_enabled: policy.ai_enabled(),
        thresholds: policy.thresholds(),
        disabled_mode: policy.disabled_mode(),
        pending: orchestrator.pending().len(),
        max_pending: orchestrator.max_pending(),
        adapters: state.intake.adapters(),
        backend: orchestrator.backend_health(),
        subscribers: orchestrator.events().subscriber_count(),
    })
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .route("/api/status", get(status))
        .with_state(state)
}

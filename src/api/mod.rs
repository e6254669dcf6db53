//! HTTP API server for the Kairos gateway

mod error;
pub mod health;
pub mod intents;
pub mod pending;
pub mod rate_limit;
pub mod songs;
pub mod state;
pub mod websocket;

pub use error::ApiError;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::SongRepo;
use crate::hitl::Orchestrator;
use crate::intake::Intake;
use crate::Result;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub intake: Arc<Intake>,
    pub songs: Option<SongRepo>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

impl ApiState {
    /// Build state around an intake pipeline; the song catalog is taken from it
    #[must_use]
    pub fn new(intake: Arc<Intake>) -> Self {
        Self {
            orchestrator: Arc::clone(intake.orchestrator()),
            songs: intake.songs().cloned(),
            intake,
            rate_limiter: None,
        }
    }

    /// Limit intake routes to `requests_per_minute`
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limiter = requests_per_minute.map(rate_limit::create_limiter);
        self
    }
}

/// Build the full application router
pub fn router(state: Arc<ApiState>) -> Router {
    let intake = intents::router(state.clone()).layer(axum::middleware::from_fn_with_state(
        state.clone(),
        rate_limit::rate_limit_middleware,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(intake)
        .nest("/api/pending", pending::router(state.clone()))
        .nest("/api/songs", songs::router(state.clone()))
        .nest("/api/state", state::router(state.clone()))
        .nest("/ws", websocket::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: ApiState, host: impl Into<String>, port: u16) -> Self {
        Self {
            state: Arc::new(state),
            host: host.into(),
            port,
        }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind or the server fails
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Spawn the API server as a background task
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kairos_gateway::api::{self, ApiState};
use kairos_gateway::db::{self, SongRepo};
use kairos_gateway::events::EventBus;
use kairos_gateway::gateway::{ExecutionGateway, GatewayConfig, RetryPolicy};
use kairos_gateway::hitl::{ConfidencePolicy, DisabledMode, Orchestrator, PendingStore, StoreConfig, Thresholds};
use kairos_gateway::intake::Intake;
use kairos_gateway::presentation::{BackendAction, BackendError, PresentationBackend};
use kairos_gateway::recognition::RuleBasedDetector;

/// Backend that records commands, optionally slowly or unsuccessfully
#[derive(Default)]
pub struct RecordingBackend {
    sent: Mutex<Vec<BackendAction>>,
    delay: Duration,
    reject: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<BackendAction> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl PresentationBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, action: &BackendAction) -> Result<serde_json::Value, BackendError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action.clone());
        if self.reject {
            return Err(BackendError::Rejected("no presentation loaded".to_string()));
        }
        Ok(serde_json::json!({ "ok": true }))
    }
}

/// Knobs for [`build`]
pub struct Setup {
    pub thresholds: Thresholds,
    pub disabled_mode: DisabledMode,
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
    pub event_buffer: usize,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::new(0.3, 0.8).unwrap(),
            disabled_mode: DisabledMode::Block,
            store: StoreConfig::default(),
            gateway: GatewayConfig {
                retry: RetryPolicy {
                    max_retries: 0,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(1),
                },
                ..GatewayConfig::default()
            },
            event_buffer: 64,
        }
    }
}

/// A fully wired pipeline over a test backend
pub struct TestApp {
    pub backend: Arc<RecordingBackend>,
    pub orchestrator: Arc<Orchestrator>,
    pub intake: Arc<Intake>,
    pub songs: SongRepo,
}

impl TestApp {
    pub fn router(&self) -> axum::Router {
        api::router(Arc::new(ApiState::new(Arc::clone(&self.intake))))
    }

    pub fn router_with_rate_limit(&self, per_minute: u32) -> axum::Router {
        let state = ApiState::new(Arc::clone(&self.intake)).with_rate_limit(Some(per_minute));
        api::router(Arc::new(state))
    }
}

pub fn build(backend: RecordingBackend, setup: Setup) -> TestApp {
    let backend = Arc::new(backend);
    let gateway = Arc::new(ExecutionGateway::new(backend.clone(), setup.gateway));
    let orchestrator = Arc::new(Orchestrator::new(
        PendingStore::new(setup.store),
        ConfidencePolicy::new(setup.thresholds, setup.disabled_mode),
        gateway,
        Arc::new(EventBus::new(setup.event_buffer)),
    ));
    let songs = SongRepo::new(setup_test_db());
    let intake = Intake::new(Arc::clone(&orchestrator), Arc::new(RuleBasedDetector))
        .with_songs(songs.clone());

    TestApp {
        backend,
        orchestrator,
        intake: Arc::new(intake),
        songs,
    }
}

pub fn default_app() -> TestApp {
    build(RecordingBackend::new(), Setup::default())
}

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> db::DbPool {
    db::init_memory().expect("failed to init test db")
}

//! Daemon - the main gateway service
//!
//! Wires configuration into the presentation backend, execution gateway,
//! orchestrator and recognition adapters, then runs the API server with the
//! expiry sweep and backend heartbeat alongside it.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::api::{ApiServer, ApiState};
use crate::config::{BackendKind, NluKind, SttKind};
use crate::db::{self, SongRepo};
use crate::events::{EventBus, HitlEvent};
use crate::gateway::ExecutionGateway;
use crate::hitl::{ConfidencePolicy, Orchestrator, PendingStore};
use crate::intake::Intake;
use crate::presentation::{DryRunBackend, HttpBackend, PresentationBackend, ProPresenterBackend};
use crate::recognition::{
    AcrCloudIdentifier, DialogflowDetector, IntentDetector, MusicIdentifier, RuleBasedDetector,
    SpeechToText, Transcriber,
};
use crate::{Config, Error, Result};

/// The Kairos daemon
pub struct Daemon {
    config: Config,
    orchestrator: Arc<Orchestrator>,
    intake: Arc<Intake>,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if a configured adapter or the song catalog cannot be
    /// initialized
    pub fn new(config: Config) -> Result<Self> {
        let backend = build_backend(&config)?;
        let gateway = Arc::new(ExecutionGateway::new(backend, config.gateway.clone()));
        let events = Arc::new(EventBus::new(config.hitl.event_buffer));

        let mut policy = ConfidencePolicy::new(config.hitl.thresholds, config.hitl.disabled_mode);
        policy.set_ai_enabled(config.hitl.ai_enabled);

        let orchestrator = Arc::new(Orchestrator::new(
            PendingStore::new(config.hitl.store),
            policy,
            gateway,
            events,
        ));

        let songs = open_song_catalog(&config)?;

        let mut intake = Intake::new(Arc::clone(&orchestrator), build_detector(&config)?)
            .with_songs(songs);
        if let Some(transcriber) = build_transcriber(&config)? {
            intake = intake.with_transcriber(transcriber);
        }
        if let Some(music) = build_music_identifier(&config)? {
            intake = intake.with_music_identifier(music);
        }

        let adapters = intake.adapters();
        tracing::info!(
            backend = orchestrator.gateway().backend_name(),
            nlu = adapters.nlu,
            stt = adapters.stt.unwrap_or("none"),
            music_id = adapters.music_id.unwrap_or("none"),
            "daemon initialized"
        );

        Ok(Self {
            config,
            orchestrator,
            intake: Arc::new(intake),
        })
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails
    pub async fn run(self) -> Result<()> {
        let state = ApiState::new(Arc::clone(&self.intake))
            .with_rate_limit(self.config.server.rate_limit_per_minute);
        let server = ApiServer::new(state, self.config.server.host.clone(), self.config.server.port);

        let sweeper = self.spawn_sweeper();
        let heartbeat = self.spawn_heartbeat();
        let mut api = server.spawn();

        tracing::info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            "daemon running"
        );

        let result = tokio::select! {
            res = &mut api => match res {
                Ok(inner) => inner,
                Err(e) => Err(Error::Config(format!("API server task failed: {e}"))),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                api.abort();
                Ok(())
            }
        };

        sweeper.abort();
        heartbeat.abort();

        let abandoned = self.orchestrator.pending().len();
        if abandoned > 0 {
            tracing::warn!(abandoned, "shutting down with confirmations still pending");
        }
        tracing::info!("daemon stopped");
        result
    }

    /// Periodically expire overdue confirmations
    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let period = self.config.hitl.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let expired = orchestrator.tick(Utc::now());
                if !expired.is_empty() {
                    tracing::debug!(count = expired.len(), "sweep expired confirmations");
                }
            }
        })
    }

    /// Probe the backend and publish reachability changes
    fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let period = self.config.presentation.heartbeat_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last = None;
            loop {
                interval.tick().await;
                let health = orchestrator.gateway().probe().await;
                if health.reachable != last {
                    if health.reachable == Some(false) {
                        tracing::warn!(
                            backend = health.backend,
                            error = health.last_error.as_deref().unwrap_or(""),
                            "presentation backend unreachable"
                        );
                    } else {
                        tracing::info!(backend = health.backend, "presentation backend reachable");
                    }
                    last = health.reachable;
                    orchestrator.events().publish(HitlEvent::BackendStatus { health });
                }
            }
        })
    }
}

fn build_backend(config: &Config) -> Result<Arc<dyn PresentationBackend>> {
    let presentation = &config.presentation;
    let backend: Arc<dyn PresentationBackend> = match presentation.backend {
        BackendKind::ProPresenter => {
            tracing::info!(
                host = %presentation.propresenter.host,
                port = presentation.propresenter.port,
                "using ProPresenter backend"
            );
            Arc::new(ProPresenterBackend::new(presentation.propresenter.clone()))
        }
        BackendKind::Http => {
            let http = presentation
                .http
                .clone()
                .ok_or_else(|| Error::Config("HTTP backend selected without a base URL".to_string()))?;
            tracing::info!(url = %http.base_url, "using HTTP backend");
            Arc::new(HttpBackend::new(http)?)
        }
        BackendKind::DryRun => {
            tracing::warn!("dry-run backend: commands are logged, not sent");
            Arc::new(DryRunBackend::new())
        }
    };
    Ok(backend)
}

fn build_detector(config: &Config) -> Result<Arc<dyn IntentDetector>> {
    let detector: Arc<dyn IntentDetector> = match config.recognition.nlu {
        NluKind::RuleBased => Arc::new(RuleBasedDetector),
        NluKind::Dialogflow => {
            let df = config
                .recognition
                .dialogflow
                .clone()
                .ok_or_else(|| Error::Config("Dialogflow selected but not configured".to_string()))?;
            Arc::new(DialogflowDetector::new(df)?)
        }
    };
    Ok(detector)
}

fn build_transcriber(config: &Config) -> Result<Option<Arc<dyn Transcriber>>> {
    let Some(stt) = &config.recognition.stt else {
        tracing::info!("speech-to-text disabled (no API key)");
        return Ok(None);
    };
    let transcriber = match stt.provider {
        SttKind::Whisper => SpeechToText::new_whisper(stt.api_key.clone(), stt.model.clone())?,
        SttKind::Deepgram => SpeechToText::new_deepgram(stt.api_key.clone(), stt.model.clone())?,
    };
    Ok(Some(Arc::new(transcriber)))
}

fn build_music_identifier(config: &Config) -> Result<Option<Arc<dyn MusicIdentifier>>> {
    let Some(acr) = &config.recognition.acrcloud else {
        tracing::info!("music identification disabled (ACRCloud not configured)");
        return Ok(None);
    };
    Ok(Some(Arc::new(AcrCloudIdentifier::new(acr.clone())?)))
}

fn open_song_catalog(config: &Config) -> Result<SongRepo> {
    let pool = match &config.database.path {
        Some(path) => {
            let pool = db::init(path)?;
            tracing::info!(path = %path.display(), "song catalog opened");
            pool
        }
        None => {
            tracing::info!("song catalog kept in memory");
            db::init_memory()?
        }
    };
    Ok(SongRepo::new(pool))
}

//! Input channels: turn text, speech and music samples into submitted intents
//!
//! Recognition failures stop here and never reach the orchestrator. A
//! `go-to-song` intent is resolved against the song catalog before
//! submission so the backend receives a presentation identifier.

use std::sync::Arc;

use serde::Serialize;

use crate::db::SongRepo;
use crate::hitl::{Orchestrator, SubmitOutcome};
use crate::intent::{Intent, IntentName, IntentSource};
use crate::recognition::{IntentDetector, MusicIdentifier, TrackMatch, Transcriber};
use crate::{Error, Result};

/// Result of pushing input through a channel
#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    /// `None` when nothing actionable was recognized
    pub outcome: Option<SubmitOutcome>,
}

impl IntakeOutcome {
    const fn unrecognized() -> Self {
        Self {
            transcript: None,
            track: None,
            intent: None,
            outcome: None,
        }
    }
}

/// Names of the configured adapters
#[derive(Debug, Clone, Serialize)]
pub struct AdapterNames {
    pub nlu: &'static str,
    pub stt: Option<&'static str>,
    pub music_id: Option<&'static str>,
    pub song_catalog: bool,
}

/// Intake pipeline
pub struct Intake {
    orchestrator: Arc<Orchestrator>,
    detector: Arc<dyn IntentDetector>,
    transcriber: Option<Arc<dyn Transcriber>>,
    music: Option<Arc<dyn MusicIdentifier>>,
    songs: Option<SongRepo>,
}

impl Intake {
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, detector: Arc<dyn IntentDetector>) -> Self {
        Self {
            orchestrator,
            detector,
            transcriber: None,
            music: None,
            songs: None,
        }
    }

    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    #[must_use]
    pub fn with_music_identifier(mut self, music: Arc<dyn MusicIdentifier>) -> Self {
        self.music = Some(music);
        self
    }

    #[must_use]
    pub fn with_songs(mut self, songs: SongRepo) -> Self {
        self.songs = Some(songs);
        self
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    #[must_use]
    pub fn songs(&self) -> Option<&SongRepo> {
        self.songs.as_ref()
    }

    #[must_use]
    pub fn adapters(&self) -> AdapterNames {
        AdapterNames {
            nlu: self.detector.name(),
            stt: self.transcriber.as_ref().map(|t| t.name()),
            music_id: self.music.as_ref().map(|m| m.name()),
            song_catalog: self.songs.is_some(),
        }
    }

    /// Submit an already-structured intent
    ///
    /// # Errors
    ///
    /// `Recognition` if a song title is not in the catalog, otherwise
    /// whatever [`Orchestrator::submit`] returns
    pub async fn submit_intent(&self, intent: Intent) -> Result<SubmitOutcome> {
        let intent = self.resolve_song(intent)?;
        self.orchestrator.submit(intent).await
    }

    /// Detect an intent in free text and submit it
    ///
    /// # Errors
    ///
    /// `Recognition` when the detector fails; see [`Self::submit_intent`]
    pub async fn submit_text(&self, text: &str, source: IntentSource) -> Result<IntakeOutcome> {
        let detection = self.detector.detect(text).await.map_err(recognition)?;

        let Some(intent) = detection.into_intent(source, text.trim()) else {
            tracing::debug!(text, "no intent recognized");
            return Ok(IntakeOutcome::unrecognized());
        };

        let outcome = self.submit_intent(intent.clone()).await?;
        Ok(IntakeOutcome {
            intent: Some(intent),
            outcome: Some(outcome),
            ..IntakeOutcome::unrecognized()
        })
    }

    /// Transcribe speech, then treat it as text
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a transcriber, `Recognition` on ASR failure
    pub async fn submit_audio(&self, audio: &[u8], mime: &str) -> Result<IntakeOutcome> {
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or(Error::NotConfigured("speech-to-text"))?;
        let transcript = transcriber
            .transcribe(audio, mime)
            .await
            .map_err(recognition)?;

        let mut outcome = if transcript.trim().is_empty() {
            IntakeOutcome::unrecognized()
        } else {
            self.submit_text(&transcript, IntentSource::Voice).await?
        };
        outcome.transcript = Some(transcript);
        Ok(outcome)
    }

    /// Identify the song in an audio sample and go to it
    ///
    /// # Errors
    ///
    /// `NotConfigured` without an identifier, `Recognition` on failure
    pub async fn submit_music(&self, audio: &[u8]) -> Result<IntakeOutcome> {
        let music = self
            .music
            .as_ref()
            .ok_or(Error::NotConfigured("music identification"))?;
        let track = music.identify(audio).await.map_err(recognition)?;

        match track {
            Some(track) => self.submit_track(track).await,
            None => {
                tracing::debug!("no track identified");
                Ok(IntakeOutcome::unrecognized())
            }
        }
    }

    /// Submit a `go-to-song` for an identified (or simulated) track
    ///
    /// # Errors
    ///
    /// See [`Self::submit_intent`]
    pub async fn submit_track(&self, track: TrackMatch) -> Result<IntakeOutcome> {
        let mut intent = Intent::new(
            IntentName::GoToSong,
            track.confidence.clamp(0.0, 1.0),
            IntentSource::MusicId,
        )
        .with_param("song_title", track.title.clone());
        if let Some(artist) = &track.artist {
            intent = intent.with_param("artist", artist.clone());
        }

        let outcome = self.submit_intent(intent.clone()).await?;
        Ok(IntakeOutcome {
            track: Some(track),
            intent: Some(intent),
            outcome: Some(outcome),
            transcript: None,
        })
    }

    /// Attach the catalog identifier to a `go-to-song` intent
    fn resolve_song(&self, intent: Intent) -> Result<Intent> {
        if intent.name != IntentName::GoToSong || intent.param_str("identifier").is_some() {
            return Ok(intent);
        }
        let (Some(songs), Some(title)) = (&self.songs, intent.song_title()) else {
            return Ok(intent);
        };

        match songs.identifier_for(title)? {
            Some(identifier) => {
                tracing::debug!(title, identifier = %identifier, "resolved song");
                Ok(intent.with_param("identifier", identifier))
            }
            None => Err(Error::Recognition(format!(
                "song '{title}' is not in the catalog"
            ))),
        }
    }
}

/// Adapter failures surface as recognition failures
fn recognition(e: Error) -> Error {
    match e {
        Error::Recognition(_) | Error::NotConfigured(_) => e,
        other => Error::Recognition(other.to_string()),
    }
}

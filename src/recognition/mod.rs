//! Recognition adapters: speech-to-text, intent detection, music-ID
//!
//! These are thin clients for upstream services. Any failure here is a
//! recognition failure: no intent is formed and nothing reaches the
//! orchestrator.

mod acrcloud;
mod dialogflow;
mod rule_based;
mod stt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use acrcloud::{AcrCloudConfig, AcrCloudIdentifier};
pub use dialogflow::{DialogflowConfig, DialogflowDetector};
pub use rule_based::RuleBasedDetector;
pub use stt::SpeechToText;

use crate::Result;
use crate::intent::{Intent, IntentName, IntentSource, Parameters};

/// Converts recorded speech into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Provider name for status output
    fn name(&self) -> &'static str;

    /// Transcribe audio bytes of the given MIME type
    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<String>;
}

/// Output of an intent detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// `None` when the text matched nothing actionable
    pub name: Option<IntentName>,
    pub parameters: Parameters,
    pub confidence: f64,
}

impl Detection {
    /// Nothing recognized
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            name: None,
            parameters: Parameters::new(),
            confidence: 0.0,
        }
    }

    #[must_use]
    pub fn matched(name: IntentName, confidence: f64) -> Self {
        Self {
            name: Some(name),
            parameters: Parameters::new(),
            confidence,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Build an intent from this detection, if anything matched
    #[must_use]
    pub fn into_intent(self, source: IntentSource, raw_text: &str) -> Option<Intent> {
        let name = self.name?;
        let mut intent = Intent::new(name, self.confidence.clamp(0.0, 1.0), source)
            .with_raw_text(raw_text);
        intent.parameters = self.parameters;
        Some(intent)
    }
}

/// Maps free text to an intent
#[async_trait]
pub trait IntentDetector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn detect(&self, text: &str) -> Result<Detection>;
}

/// A recognized track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMatch {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub confidence: f64,
}

/// Identifies the song playing in an audio sample
#[async_trait]
pub trait MusicIdentifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the sample matched no known track
    async fn identify(&self, audio: &[u8]) -> Result<Option<TrackMatch>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_forms_no_intent() {
        assert!(Detection::fallback()
            .into_intent(IntentSource::Text, "hello")
            .is_none());
    }

    #[test]
    fn detection_carries_parameters_and_text() {
        let intent = Detection::matched(IntentName::GoToSection, 0.8)
            .with_param("section", "chorus 2")
            .into_intent(IntentSource::Voice, "go to chorus 2")
            .unwrap();
        assert_eq!(intent.param_str("section"), Some("chorus 2"));
        assert_eq!(intent.raw_text, "go to chorus 2");
        assert_eq!(intent.source, IntentSource::Voice);
    }
}

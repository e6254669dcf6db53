//! Recognized presentation commands
//!
//! An [`Intent`] is what every input channel (voice, text, music-ID) produces
//! before it reaches the orchestrator. It is immutable once built.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Intent parameters (argument name to value)
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Presentation action identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentName {
    #[serde(alias = "NextSlide")]
    NextSlide,
    #[serde(alias = "PreviousSlide")]
    PreviousSlide,
    #[serde(alias = "GoToSlide", alias = "set_slide")]
    GoToSlide,
    #[serde(alias = "GoToSong")]
    GoToSong,
    #[serde(alias = "GoToSection")]
    GoToSection,
    #[serde(alias = "ClearScreen")]
    ClearScreen,
    #[serde(alias = "PlayPauseMedia")]
    PlayPauseMedia,
}

impl IntentName {
    /// Wire name, e.g. `next-slide`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NextSlide => "next-slide",
            Self::PreviousSlide => "previous-slide",
            Self::GoToSlide => "go-to-slide",
            Self::GoToSong => "go-to-song",
            Self::GoToSection => "go-to-section",
            Self::ClearScreen => "clear-screen",
            Self::PlayPauseMedia => "play-pause-media",
        }
    }
}

impl fmt::Display for IntentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentName {
    type Err = Error;

    /// Accepts kebab, snake and Pascal case (`next-slide`, `NextSlide`)
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "nextslide" => Ok(Self::NextSlide),
            "previousslide" | "prevslide" => Ok(Self::PreviousSlide),
            "gotoslide" | "setslide" => Ok(Self::GoToSlide),
            "gotosong" => Ok(Self::GoToSong),
            "gotosection" => Ok(Self::GoToSection),
            "clearscreen" => Ok(Self::ClearScreen),
            "playpausemedia" => Ok(Self::PlayPauseMedia),
            _ => Err(Error::InvalidIntent(format!("unknown intent '{s}'"))),
        }
    }
}

/// Channel an intent arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentSource {
    Voice,
    #[default]
    Text,
    MusicId,
}

/// A recognized, parameterized command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub name: IntentName,
    #[serde(default, alias = "params")]
    pub parameters: Parameters,
    /// Recognition confidence in `[0, 1]`; structured submissions default to certain
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: IntentSource,
    #[serde(default)]
    pub raw_text: String,
}

const fn full_confidence() -> f64 {
    1.0
}

impl Intent {
    /// Create an intent with no parameters
    #[must_use]
    pub fn new(name: IntentName, confidence: f64, source: IntentSource) -> Self {
        Self {
            name,
            parameters: Parameters::new(),
            confidence,
            source,
            raw_text: String::new(),
        }
    }

    /// Return this intent with an extra parameter
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Return this intent with the original transcription attached
    #[must_use]
    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = text.into();
        self
    }

    /// String parameter, if present and non-empty
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Positive integer parameter; numeric strings are accepted
    #[must_use]
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        match self.parameters.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Song title for `go-to-song`, accepting the `name` alias
    #[must_use]
    pub fn song_title(&self) -> Option<&str> {
        self.param_str("song_title")
            .or_else(|| self.param_str("name"))
    }

    /// Check confidence range and required parameters
    ///
    /// # Errors
    ///
    /// Returns `InvalidIntent` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidIntent(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }

        match self.name {
            IntentName::GoToSlide => match self.param_u64("slide") {
                Some(n) if n > 0 => Ok(()),
                _ => Err(Error::InvalidIntent(
                    "go-to-slide requires a positive integer `slide`".to_string(),
                )),
            },
            IntentName::GoToSong => {
                if self.song_title().is_some() || self.param_str("identifier").is_some() {
                    Ok(())
                } else {
                    Err(Error::InvalidIntent(
                        "go-to-song requires `song_title`".to_string(),
                    ))
                }
            }
            IntentName::GoToSection => {
                if self.param_str("section").is_some() {
                    Ok(())
                } else {
                    Err(Error::InvalidIntent(
                        "go-to-section requires `section`".to_string(),
                    ))
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_kebab_and_legacy_names() {
        let a: Intent = serde_json::from_str(r#"{"name":"next-slide","confidence":0.9}"#).unwrap();
        let b: Intent = serde_json::from_str(r#"{"name":"NextSlide","confidence":0.9}"#).unwrap();
        assert_eq!(a.name, IntentName::NextSlide);
        assert_eq!(b.name, IntentName::NextSlide);
        assert_eq!(a.source, IntentSource::Text);
    }

    #[test]
    fn parses_names_in_any_case_style() {
        assert_eq!("GoToSlide".parse::<IntentName>().unwrap(), IntentName::GoToSlide);
        assert_eq!("set_slide".parse::<IntentName>().unwrap(), IntentName::GoToSlide);
        assert_eq!("clear-screen".parse::<IntentName>().unwrap(), IntentName::ClearScreen);
        assert!("Fallback".parse::<IntentName>().is_err());
    }

    #[test]
    fn params_alias_is_accepted() {
        let intent: Intent =
            serde_json::from_str(r#"{"name":"GoToSong","params":{"song_title":"Amazing Grace"}}"#)
                .unwrap();
        assert_eq!(intent.song_title(), Some("Amazing Grace"));
        assert!((intent.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn source_serializes_as_music_id() {
        let json = serde_json::to_value(IntentSource::MusicId).unwrap();
        assert_eq!(json, "music-id");
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let intent = Intent::new(IntentName::NextSlide, 1.5, IntentSource::Voice);
        assert!(matches!(intent.validate(), Err(Error::InvalidIntent(_))));
        let intent = Intent::new(IntentName::NextSlide, f64::NAN, IntentSource::Voice);
        assert!(intent.validate().is_err());
    }

    #[test]
    fn go_to_slide_needs_positive_slide() {
        let base = Intent::new(IntentName::GoToSlide, 0.9, IntentSource::Text);
        assert!(base.validate().is_err());
        assert!(base.clone().with_param("slide", 0).validate().is_err());
        assert!(base.clone().with_param("slide", 12).validate().is_ok());
        assert!(base.with_param("slide", "7").validate().is_ok());
    }

    #[test]
    fn section_and_song_are_required() {
        let section = Intent::new(IntentName::GoToSection, 0.9, IntentSource::Text);
        assert!(section.validate().is_err());
        assert!(section.with_param("section", "chorus").validate().is_ok());

        let song = Intent::new(IntentName::GoToSong, 0.9, IntentSource::MusicId);
        assert!(song.clone().with_param("song_title", "  ").validate().is_err());
        assert!(song.with_param("name", "Oceans").validate().is_ok());
    }
}

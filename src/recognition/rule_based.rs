//! Offline keyword-based intent detection
//!
//! Good enough for rehearsal and as a fallback when no hosted NLU is
//! configured. Patterns are checked in order; the first match wins.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{Detection, IntentDetector};
use crate::Result;
use crate::intent::IntentName;

const COMMAND_CONFIDENCE: f64 = 0.9;
const PHRASE_CONFIDENCE: f64 = 0.8;

static CLEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(clear|blank)( screen| lyrics)?\b").expect("valid regex"));
static NEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnext( slide)?\b").expect("valid regex"));
static PREVIOUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(prev(ious)?|back)( slide)?\b").expect("valid regex"));
static SLIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bslide\s+(?:number\s+)?(\d+)\b").expect("valid regex"));
static SONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(show|go to|open|lyrics for)\s+(.+)$").expect("valid regex")
});
static SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(verse|chorus|bridge|tag|intro|outro)(\s*\d+)?\b").expect("valid regex")
});
static MEDIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(play|pause|resume)( media| video| audio)?\b").expect("valid regex")
});
static POLITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(please|thanks|thank you)\b").expect("valid regex"));

/// Rule-based detector
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedDetector;

impl RuleBasedDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Synchronous detection
    #[must_use]
    pub fn detect_text(text: &str) -> Detection {
        let t = text.trim().to_lowercase();
        if t.is_empty() {
            return Detection::fallback();
        }

        if CLEAR.is_match(&t) {
            return Detection::matched(IntentName::ClearScreen, COMMAND_CONFIDENCE);
        }
        if NEXT.is_match(&t) {
            return Detection::matched(IntentName::NextSlide, COMMAND_CONFIDENCE);
        }
        if PREVIOUS.is_match(&t) {
            return Detection::matched(IntentName::PreviousSlide, COMMAND_CONFIDENCE);
        }
        if let Some(slide) = SLIDE
            .captures(&t)
            .and_then(|c| c[1].parse::<u64>().ok())
            .filter(|n| *n > 0)
        {
            return Detection::matched(IntentName::GoToSlide, PHRASE_CONFIDENCE)
                .with_param("slide", slide);
        }
        if let Some(caps) = SONG.captures(&t) {
            let title = clean_title(&caps[2]);
            // "go to chorus" names a section, not a song
            if let Some(section) = SECTION.find(&title).filter(|m| m.as_str() == title) {
                return section_detection(section.as_str());
            }
            if !title.is_empty() {
                return Detection::matched(IntentName::GoToSong, PHRASE_CONFIDENCE)
                    .with_param("song_title", title);
            }
        }
        if let Some(section) = SECTION.find(&t) {
            return section_detection(section.as_str());
        }
        if MEDIA.is_match(&t) {
            return Detection::matched(IntentName::PlayPauseMedia, PHRASE_CONFIDENCE);
        }

        Detection::fallback()
    }
}

fn section_detection(section: &str) -> Detection {
    let section = section.split_whitespace().collect::<Vec<_>>().join(" ");
    Detection::matched(IntentName::GoToSection, PHRASE_CONFIDENCE).with_param("section", section)
}

fn clean_title(raw: &str) -> String {
    let stripped = POLITE.replace_all(raw, "");
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string()
}

#[async_trait]
impl IntentDetector for RuleBasedDetector {
    fn name(&self) -> &'static str {
        "rule-based"
    }

    async fn detect(&self, text: &str) -> Result<Detection> {
        let detection = Self::detect_text(text);
        tracing::debug!(
            text,
            intent = ?detection.name,
            confidence = detection.confidence,
            "rule-based detection"
        );
        Ok(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_of(text: &str) -> Option<IntentName> {
        RuleBasedDetector::detect_text(text).name
    }

    #[test]
    fn simple_commands() {
        assert_eq!(name_of("Next slide"), Some(IntentName::NextSlide));
        assert_eq!(name_of("go back"), Some(IntentName::PreviousSlide));
        assert_eq!(name_of("previous"), Some(IntentName::PreviousSlide));
        assert_eq!(name_of("blank the screen"), Some(IntentName::ClearScreen));
        assert_eq!(name_of("pause the video"), Some(IntentName::PlayPauseMedia));
    }

    #[test]
    fn command_confidence() {
        let d = RuleBasedDetector::detect_text("next");
        assert!((d.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn song_title_is_cleaned() {
        let d = RuleBasedDetector::detect_text("Show Amazing Grace please.");
        assert_eq!(d.name, Some(IntentName::GoToSong));
        assert_eq!(d.parameters["song_title"], "amazing grace");
        assert!((d.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn slide_number() {
        let d = RuleBasedDetector::detect_text("go to slide 12");
        assert_eq!(d.name, Some(IntentName::GoToSlide));
        assert_eq!(d.parameters["slide"], 12);
        assert_eq!(name_of("slide 0"), None);
    }

    #[test]
    fn sections() {
        let d = RuleBasedDetector::detect_text("chorus 2");
        assert_eq!(d.name, Some(IntentName::GoToSection));
        assert_eq!(d.parameters["section"], "chorus 2");

        let d = RuleBasedDetector::detect_text("go to verse  3");
        assert_eq!(d.name, Some(IntentName::GoToSection));
        assert_eq!(d.parameters["section"], "verse 3");
    }

    #[test]
    fn unknown_text_is_fallback() {
        let d = RuleBasedDetector::detect_text("good morning everyone");
        assert_eq!(d, Detection::fallback());
        assert_eq!(name_of("   "), None);
    }
}

//! Confidence routing: auto-execute, hold for the operator, or drop

use serde::{Deserialize, Serialize};

use crate::intent::Intent;
use crate::{Error, Result};

/// Default confidence at or above which intents execute without a human
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.85;

/// Default confidence below which intents are treated as noise
pub const DEFAULT_LOW_THRESHOLD: f64 = 0.3;

/// Routing decision for a recognized intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "routing", content = "reason", rename_all = "snake_case")]
pub enum Routing {
    Auto,
    Confirm,
    Reject(RejectReason),
}

/// Why an intent was not surfaced as actionable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Confidence below the low threshold
    LowConfidence,
    /// Operator kill switch is engaged in `block` mode
    AiDisabled,
}

/// What the kill switch does while AI is disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisabledMode {
    /// Reject every intent
    #[default]
    Block,
    /// Send everything that would auto-execute through confirmation
    Confirm,
}

/// Low/high confidence thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Build validated thresholds
    ///
    /// # Errors
    ///
    /// Returns `Config` unless `0 <= low <= high <= 1`
    pub fn new(low: f64, high: f64) -> Result<Self> {
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_range(low) || !in_range(high) || low > high {
            return Err(Error::Config(format!(
                "thresholds must satisfy 0 <= low <= high <= 1 (got low={low}, high={high})"
            )));
        }
        Ok(Self { low, high })
    }
}

/// Confidence policy
///
/// `decide` is pure: the same thresholds, toggle and confidence always
/// yield the same routing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    thresholds: Thresholds,
    ai_enabled: bool,
    disabled_mode: DisabledMode,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self::new(Thresholds::default(), DisabledMode::default())
    }
}

impl ConfidencePolicy {
    #[must_use]
    pub const fn new(thresholds: Thresholds, disabled_mode: DisabledMode) -> Self {
        Self {
            thresholds,
            ai_enabled: true,
            disabled_mode,
        }
    }

    /// Route an intent by its confidence
    #[must_use]
    pub fn decide(&self, intent: &Intent) -> Routing {
        let c = intent.confidence;

        if !self.ai_enabled && self.disabled_mode == DisabledMode::Block {
            return Routing::Reject(RejectReason::AiDisabled);
        }

        if c < self.thresholds.low {
            Routing::Reject(RejectReason::LowConfidence)
        } else if c >= self.thresholds.high && self.ai_enabled {
            Routing::Auto
        } else {
            Routing::Confirm
        }
    }

    #[must_use]
    pub const fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    #[must_use]
    pub const fn ai_enabled(&self) -> bool {
        self.ai_enabled
    }

    pub fn set_ai_enabled(&mut self, enabled: bool) {
        self.ai_enabled = enabled;
    }

    #[must_use]
    pub const fn disabled_mode(&self) -> DisabledMode {
        self.disabled_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{IntentName, IntentSource};

    fn intent(confidence: f64) -> Intent {
        Intent::new(IntentName::NextSlide, confidence, IntentSource::Voice)
    }

    #[test]
    fn routes_by_thresholds() {
        let policy = ConfidencePolicy::default();
        assert_eq!(policy.decide(&intent(0.95)), Routing::Auto);
        assert_eq!(policy.decide(&intent(0.85)), Routing::Auto);
        assert_eq!(policy.decide(&intent(0.6)), Routing::Confirm);
        assert_eq!(policy.decide(&intent(0.3)), Routing::Confirm);
        assert_eq!(
            policy.decide(&intent(0.1)),
            Routing::Reject(RejectReason::LowConfidence)
        );
    }

    #[test]
    fn block_mode_rejects_everything_when_disabled() {
        let mut policy = ConfidencePolicy::new(Thresholds::default(), DisabledMode::Block);
        policy.set_ai_enabled(false);
        for c in [0.0, 0.5, 1.0] {
            assert_eq!(
                policy.decide(&intent(c)),
                Routing::Reject(RejectReason::AiDisabled)
            );
        }
    }

    #[test]
    fn confirm_mode_gates_auto_routes_when_disabled() {
        let mut policy = ConfidencePolicy::new(Thresholds::default(), DisabledMode::Confirm);
        policy.set_ai_enabled(false);
        assert_eq!(policy.decide(&intent(0.99)), Routing::Confirm);
        assert_eq!(policy.decide(&intent(0.5)), Routing::Confirm);
        assert_eq!(
            policy.decide(&intent(0.05)),
            Routing::Reject(RejectReason::LowConfidence)
        );

        policy.set_ai_enabled(true);
        assert_eq!(policy.decide(&intent(0.99)), Routing::Auto);
    }

    #[test]
    fn threshold_validation() {
        assert!(Thresholds::new(0.3, 0.85).is_ok());
        assert!(Thresholds::new(0.5, 0.5).is_ok());
        assert!(Thresholds::new(0.9, 0.2).is_err());
        assert!(Thresholds::new(-0.1, 0.5).is_err());
        assert!(Thresholds::new(0.1, 1.5).is_err());
        assert!(Thresholds::new(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn thresholds_are_adjustable() {
        let mut policy = ConfidencePolicy::default();
        policy.set_thresholds(Thresholds::new(0.5, 0.7).unwrap());
        assert_eq!(policy.decide(&intent(0.75)), Routing::Auto);
        assert_eq!(
            policy.decide(&intent(0.4)),
            Routing::Reject(RejectReason::LowConfidence)
        );
    }
}

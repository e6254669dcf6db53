//! Intake endpoints: structured intents, text, speech and music samples

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use base64::Engine;
use serde::Deserialize;

use super::{ApiError, ApiState};
use crate::hitl::SubmitOutcome;
use crate::intake::IntakeOutcome;
use crate::intent::{Intent, IntentSource};
use crate::recognition::TrackMatch;

/// Confidence given to a simulated music match without one
const SIMULATED_MATCH_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub text: String,
    #[serde(default)]
    pub source: IntentSource,
}

#[derive(Debug, Deserialize)]
pub struct RecognizeRequest {
    /// Base64-encoded audio
    pub audio: String,
    #[serde(default = "default_mime")]
    pub mime: String,
}

fn default_mime() -> String {
    "audio/wav".to_string()
}

/// Either a real sample or a simulated match
#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default, alias = "audio_base64")]
    pub audio: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

async fn submit_intent(
    State(state): State<Arc<ApiState>>,
    Json(intent): Json<Intent>,
) -> Result<Json<SubmitOutcome>, ApiError> {
    let outcome = state.intake.submit_intent(intent).await?.into_result()?;
    Ok(Json(outcome))
}

async fn detect(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<IntakeOutcome>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }
    let outcome = state.intake.submit_text(&req.text, req.source).await?;
    Ok(Json(checked(outcome)?))
}

async fn recognize(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<RecognizeRequest>,
) -> Result<Json<IntakeOutcome>, ApiError> {
    let audio = decode_audio(&req.audio)?;
    let outcome = state.intake.submit_audio(&audio, &req.mime).await?;
    Ok(Json(checked(outcome)?))
}

async fn identify(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<IdentifyRequest>,
) -> Result<Json<IntakeOutcome>, ApiError> {
    let outcome = match (req.audio, req.title) {
        (Some(audio), _) => {
            let audio = decode_audio(&audio)?;
            state.intake.submit_music(&audio).await?
        }
        (None, Some(title)) if !title.trim().is_empty() => {
            tracing::debug!(title = %title, "simulated music match");
            let track = TrackMatch {
                title: title.trim().to_string(),
                artist: req.artist,
                confidence: req.confidence.unwrap_or(SIMULATED_MATCH_CONFIDENCE),
            };
            state.intake.submit_track(track).await?
        }
        _ => return Err(ApiError::bad_request("audio or title is required")),
    };
    Ok(Json(checked(outcome)?))
}

/// Failed auto-executions surface as error statuses
fn checked(mut outcome: IntakeOutcome) -> Result<IntakeOutcome, ApiError> {
    outcome.outcome = outcome
        .outcome
        .map(SubmitOutcome::into_result)
        .transpose()?;
    Ok(outcome)
}

fn decode_audio(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let audio = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::bad_request(format!("invalid base64 audio: {e}")))?;
    if audio.is_empty() {
        return Err(ApiError::bad_request("audio is empty"));
    }
    Ok(audio)
}

/// Build the intake router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/intent", post(submit_intent))
        .route("/api/nlu/detect", post(detect))
        .route("/api/stt/recognize", post(recognize))
        .route("/api/music/identify", post(identify))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_audio_and_rejects_garbage() {
        assert_eq!(decode_audio("AQID").unwrap(), vec![1, 2, 3]);
        assert!(decode_audio("not base64!").is_err());
        assert!(decode_audio("").is_err());
    }

    #[test]
    fn identify_request_accepts_either_shape() {
        let sim: IdentifyRequest =
            serde_json::from_str(r#"{"title": "Oceans", "confidence": 0.7}"#).unwrap();
        assert_eq!(sim.title.as_deref(), Some("Oceans"));
        assert!(sim.audio.is_none());

        let real: IdentifyRequest = serde_json::from_str(r#"{"audio_base64": "AQID"}"#).unwrap();
        assert_eq!(real.audio.as_deref(), Some("AQID"));
    }
}

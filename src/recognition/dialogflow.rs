//! Dialogflow CX intent detection over REST

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use uuid::Uuid;

use super::{Detection, IntentDetector};
use crate::intent::{IntentName, Parameters};
use crate::{Error, Result};

/// Dialogflow CX agent settings
#[derive(Debug, Clone)]
pub struct DialogflowConfig {
    pub project_id: String,
    pub location: String,
    pub agent_id: String,
    pub language_code: String,
    /// OAuth access token for the Dialogflow API
    pub access_token: SecretString,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<QueryResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    intent: Option<MatchedIntent>,
    #[serde(default, rename = "match")]
    matched: Option<Match>,
    #[serde(default)]
    parameters: Parameters,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchedIntent {
    #[serde(default)]
    display_name: String,
}

#[derive(Deserialize)]
struct Match {
    #[serde(default)]
    confidence: f64,
}

/// Dialogflow CX detector
pub struct DialogflowDetector {
    client: reqwest::Client,
    config: DialogflowConfig,
}

impl DialogflowDetector {
    /// Create a new detector
    ///
    /// # Errors
    ///
    /// Returns error if the agent path is incomplete
    pub fn new(config: DialogflowConfig) -> Result<Self> {
        if config.project_id.is_empty() || config.location.is_empty() || config.agent_id.is_empty()
        {
            return Err(Error::Config("Dialogflow settings incomplete".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    fn session_url(&self, session: &str) -> String {
        let host = if self.config.location == "global" {
            "dialogflow.googleapis.com".to_string()
        } else {
            format!("{}-dialogflow.googleapis.com", self.config.location)
        };
        format!(
            "https://{host}/v3/projects/{}/locations/{}/agents/{}/sessions/{session}:detectIntent",
            self.config.project_id, self.config.location, self.config.agent_id
        )
    }
}

/// Keep string parameters only; entity values arrive as strings
fn string_parameters(raw: Parameters) -> Parameters {
    raw.into_iter()
        .filter(|(_, v)| v.as_str().is_some_and(|s| !s.is_empty()))
        .collect()
}

fn into_detection(response: DetectIntentResponse) -> Detection {
    let Some(result) = response.query_result else {
        return Detection::fallback();
    };
    let name = result
        .intent
        .and_then(|i| i.display_name.parse::<IntentName>().ok());
    let Some(name) = name else {
        return Detection::fallback();
    };

    Detection {
        name: Some(name),
        parameters: string_parameters(result.parameters),
        confidence: result.matched.map_or(0.0, |m| m.confidence),
    }
}

#[async_trait]
impl IntentDetector for DialogflowDetector {
    fn name(&self) -> &'static str {
        "dialogflow"
    }

    async fn detect(&self, text: &str) -> Result<Detection> {
        let url = self.session_url(&Uuid::new_v4().to_string());
        let body = serde_json::json!({
            "queryInput": {
                "text": { "text": text },
                "languageCode": self.config.language_code,
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Dialogflow request failed");
                Error::Recognition(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Dialogflow API error");
            return Err(Error::Recognition(format!(
                "Dialogflow API error {status}: {body}"
            )));
        }

        let parsed: DetectIntentResponse = response
            .json()
            .await
            .map_err(|e| Error::Recognition(e.to_string()))?;
        let detection = into_detection(parsed);
        tracing::debug!(
            intent = ?detection.name,
            confidence = detection.confidence,
            "Dialogflow detection"
        );
        Ok(detection)
    }
}

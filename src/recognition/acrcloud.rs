//! ACRCloud music identification

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha1::Sha1;

use super::{MusicIdentifier, TrackMatch};
use crate::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

const IDENTIFY_URI: &str = "/v1/identify";
const DATA_TYPE: &str = "audio";
const SIGNATURE_VERSION: &str = "1";

/// Confidence assumed when a match carries no score
const UNSCORED_CONFIDENCE: f64 = 0.9;

/// ACRCloud project credentials
#[derive(Debug, Clone)]
pub struct AcrCloudConfig {
    /// e.g. `identify-eu-west-1.acrcloud.com`
    pub host: String,
    pub access_key: String,
    pub access_secret: SecretString,
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct IdentifyResponse {
    status: Status,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
struct Status {
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Deserialize)]
struct Metadata {
    #[serde(default)]
    music: Vec<Music>,
}

#[derive(Deserialize)]
struct Music {
    title: String,
    #[serde(default)]
    artists: Vec<Artist>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Deserialize)]
struct Artist {
    name: String,
}

/// ACRCloud identifier
pub struct AcrCloudIdentifier {
    client: reqwest::Client,
    config: AcrCloudConfig,
}

impl AcrCloudIdentifier {
    /// Create a new identifier
    ///
    /// # Errors
    ///
    /// Returns error if credentials are missing or the client cannot be built
    pub fn new(config: AcrCloudConfig) -> Result<Self> {
        if config.host.is_empty()
            || config.access_key.is_empty()
            || config.access_secret.expose_secret().is_empty()
        {
            return Err(Error::Config("ACRCloud not configured".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Base64 HMAC-SHA1 request signature
    fn sign(&self, timestamp: &str) -> Result<String> {
        let string_to_sign = [
            "POST",
            IDENTIFY_URI,
            &self.config.access_key,
            DATA_TYPE,
            SIGNATURE_VERSION,
            timestamp,
        ]
        .join("\n");

        let mut mac = HmacSha1::new_from_slice(self.config.access_secret.expose_secret().as_bytes())
            .map_err(|e| Error::Config(format!("invalid ACRCloud secret: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

fn parse_response(response: IdentifyResponse) -> Result<Option<TrackMatch>> {
    match response.status.code {
        0 => {}
        // No result
        1001 => return Ok(None),
        code => {
            return Err(Error::Recognition(format!(
                "ACRCloud status {code}: {}",
                response.status.msg
            )));
        }
    }

    let Some(top) = response.metadata.and_then(|m| m.music.into_iter().next()) else {
        return Ok(None);
    };

    Ok(Some(TrackMatch {
        artist: top.artists.into_iter().next().map(|a| a.name),
        confidence: top
            .score
            .map_or(UNSCORED_CONFIDENCE, |s| (s / 100.0).clamp(0.0, 1.0)),
        title: top.title,
    }))
}

#[async_trait]
impl MusicIdentifier for AcrCloudIdentifier {
    fn name(&self) -> &'static str {
        "acrcloud"
    }

    async fn identify(&self, audio: &[u8]) -> Result<Option<TrackMatch>> {
        if audio.is_empty() {
            return Err(Error::Recognition("empty audio sample".to_string()));
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();
        let signature = self.sign(&timestamp)?;

        let form = [
            ("access_key", self.config.access_key.clone()),
            ("sample_bytes", audio.len().to_string()),
            ("sample", BASE64.encode(audio)),
            ("timestamp", timestamp),
            ("signature", signature),
            ("data_type", DATA_TYPE.to_string()),
            ("signature_version", SIGNATURE_VERSION.to_string()),
        ];

        let url = format!("https://{}{IDENTIFY_URI}", self.config.host);
        tracing::debug!(audio_bytes = audio.len(), url = %url, "identifying track");

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "ACRCloud request failed");
                Error::Recognition(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "ACRCloud API error");
            return Err(Error::Recognition(format!(
                "ACRCloud API error {status}: {body}"
            )));
        }

        let parsed: IdentifyResponse = response
            .json()
            .await
            .map_err(|e| Error::Recognition(e.to_string()))?;
        let track = parse_response(parsed)?;
        tracing::info!(track = ?track, "music identification complete");
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifier() -> AcrCloudIdentifier {
        AcrCloudIdentifier::new(AcrCloudConfig {
            host: "identify-eu-west-1.acrcloud.com".into(),
            access_key: "key".into(),
            access_secret: SecretString::from("secret"),
            timeout: Duration::from_secs(6),
        })
        .unwrap()
    }

    fn parse(json: serde_json::Value) -> Result<Option<TrackMatch>> {
        parse_response(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn signature_is_stable_base64() {
        let id = identifier();
        let a = id.sign("1700000000").unwrap();
        let b = id.sign("1700000000").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, id.sign("1700000001").unwrap());
        // 20-byte SHA-1 digest
        assert_eq!(BASE64.decode(&a).unwrap().len(), 20);
    }

    #[test]
    fn missing_credentials_are_config_error() {
        let err = AcrCloudIdentifier::new(AcrCloudConfig {
            host: String::new(),
            access_key: "key".into(),
            access_secret: SecretString::from("secret"),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn parses_top_match() {
        let track = parse(serde_json::json!({
            "status": { "code": 0, "msg": "Success" },
            "metadata": { "music": [
                { "title": "Oceans", "artists": [{ "name": "Hillsong United" }], "score": 87 },
                { "title": "Other", "score": 20 }
            ]}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(track.title, "Oceans");
        assert_eq!(track.artist.as_deref(), Some("Hillsong United"));
        assert!((track.confidence - 0.87).abs() < 1e-9);
    }

    #[test]
    fn unscored_match_gets_default_confidence() {
        let track = parse(serde_json::json!({
            "status": { "code": 0 },
            "metadata": { "music": [{ "title": "Oceans" }] }
        }))
        .unwrap()
        .unwrap();
        assert!((track.confidence - UNSCORED_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn no_result_and_errors() {
        assert!(parse(serde_json::json!({ "status": { "code": 1001, "msg": "No result" } }))
            .unwrap()
            .is_none());
        assert!(matches!(
            parse(serde_json::json!({ "status": { "code": 3001, "msg": "Missing/Invalid Access Key" } })),
            Err(Error::Recognition(_))
        ));
    }
}

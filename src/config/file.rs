//! TOML configuration file loading
//!
//! Supports `~/.config/kairos/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::gateway::AdmissionMode;
use crate::hitl::DisabledMode;

use super::{BackendKind, NluKind, SttKind};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KairosConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,

    #[serde(default)]
    pub hitl: HitlFileConfig,

    #[serde(default)]
    pub gateway: GatewayFileConfig,

    #[serde(default)]
    pub presentation: PresentationFileConfig,

    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    #[serde(default)]
    pub database: DatabaseFileConfig,
}

/// HTTP/WebSocket server
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Requests per minute on intake routes
    pub rate_limit_per_minute: Option<u32>,
}

/// Confirmation pipeline
#[derive(Debug, Default, Deserialize)]
pub struct HitlFileConfig {
    pub high_threshold: Option<f64>,
    pub low_threshold: Option<f64>,
    pub ai_enabled: Option<bool>,
    pub disabled_mode: Option<DisabledMode>,
    pub pending_ttl_secs: Option<u64>,
    pub grace_secs: Option<u64>,
    pub max_pending: Option<usize>,
    pub sweep_interval_ms: Option<u64>,
    pub event_buffer: Option<usize>,
}

/// Execution gateway
#[derive(Debug, Default, Deserialize)]
pub struct GatewayFileConfig {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub admission: Option<AdmissionMode>,
}

/// Presentation backend
#[derive(Debug, Default, Deserialize)]
pub struct PresentationFileConfig {
    pub backend: Option<BackendKind>,
    pub heartbeat_secs: Option<u64>,
    #[serde(default)]
    pub propresenter: ProPresenterFileConfig,
    #[serde(default)]
    pub http: HttpFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProPresenterFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpFileConfig {
    pub base_url: Option<String>,
    pub health_route: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Recognition adapters
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    pub nlu: Option<NluKind>,
    pub stt: Option<SttKind>,
    pub stt_model: Option<String>,
    #[serde(default)]
    pub dialogflow: DialogflowFileConfig,
    #[serde(default)]
    pub acrcloud: AcrCloudFileConfig,
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct DialogflowFileConfig {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub agent_id: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AcrCloudFileConfig {
    pub host: Option<String>,
    pub access_key: Option<String>,
    pub access_secret: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// API keys for external services
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
}

/// Song catalog
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    pub path: Option<PathBuf>,
}

/// Load the TOML config file from the standard path
///
/// Returns `KairosConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> KairosConfigFile {
    config_file_path().map_or_else(KairosConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
pub fn load_from(path: &Path) -> KairosConfigFile {
    if !path.exists() {
        return KairosConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                KairosConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            KairosConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/kairos/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("kairos").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let fc: KairosConfigFile = toml::from_str(
            r#"
            [server]
            port = 9000

            [hitl]
            high_threshold = 0.9
            disabled_mode = "confirm"

            [gateway]
            admission = "fail-fast"

            [presentation]
            backend = "dry-run"

            [presentation.propresenter]
            host = "10.0.0.5"

            [recognition]
            nlu = "dialogflow"
            "#,
        )
        .unwrap();

        assert_eq!(fc.server.port, Some(9000));
        assert_eq!(fc.hitl.disabled_mode, Some(DisabledMode::Confirm));
        assert_eq!(fc.gateway.admission, Some(AdmissionMode::FailFast));
        assert_eq!(fc.presentation.backend, Some(BackendKind::DryRun));
        assert_eq!(fc.presentation.propresenter.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(fc.recognition.nlu, Some(NluKind::Dialogflow));
        assert!(fc.database.path.is_none());
    }

    #[test]
    fn missing_file_is_default() {
        let fc = load_from(Path::new("/nonexistent/kairos/config.toml"));
        assert!(fc.server.port.is_none());
    }
}

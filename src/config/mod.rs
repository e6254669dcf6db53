//! Configuration management for the Kairos gateway
//!
//! Precedence is env > TOML file > default. CLI flags are applied on top
//! by the binary.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use serde::de::IntoDeserializer;

use crate::gateway::{AdmissionMode, GatewayConfig, RetryPolicy};
use crate::hitl::{DisabledMode, StoreConfig, Thresholds};
use crate::presentation::{HttpBackendConfig, ProPresenterConfig};
use crate::recognition::{AcrCloudConfig, DialogflowConfig};
use crate::{Error, Result};

use file::KairosConfigFile;

/// Which presentation backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    #[serde(alias = "propresenter")]
    #[value(alias = "propresenter")]
    ProPresenter,
    Http,
    DryRun,
}

/// Which intent detector to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NluKind {
    #[default]
    RuleBased,
    Dialogflow,
}

/// Which speech-to-text provider to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SttKind {
    Whisper,
    Deepgram,
}

/// Kairos gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub hitl: HitlConfig,
    pub gateway: GatewayConfig,
    pub presentation: PresentationConfig,
    pub recognition: RecognitionConfig,
    pub database: DatabaseConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests per minute on intake routes; `None` disables limiting
    pub rate_limit_per_minute: Option<u32>,
}

/// Confirmation pipeline configuration
#[derive(Debug, Clone)]
pub struct HitlConfig {
    pub thresholds: Thresholds,
    pub ai_enabled: bool,
    pub disabled_mode: DisabledMode,
    pub store: StoreConfig,
    /// How often overdue confirmations are expired
    pub sweep_interval: Duration,
    /// Per-subscriber event buffer
    pub event_buffer: usize,
}

/// Presentation backend configuration
#[derive(Debug, Clone)]
pub struct PresentationConfig {
    pub backend: BackendKind,
    pub propresenter: ProPresenterConfig,
    pub http: Option<HttpBackendConfig>,
    /// Reachability probe interval
    pub heartbeat_interval: Duration,
}

/// Speech-to-text settings
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub provider: SttKind,
    pub api_key: SecretString,
    pub model: String,
}

/// Recognition adapter configuration
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub nlu: NluKind,
    pub dialogflow: Option<DialogflowConfig>,
    pub stt: Option<SttConfig>,
    pub acrcloud: Option<AcrCloudConfig>,
}

/// Song catalog configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` keeps the catalog in memory
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or a selected adapter is
    /// missing required settings
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// See [`Self::load`]
    pub fn from_sources(fc: KairosConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&env);

        let server = ServerConfig {
            host: env
                .string("KAIROS_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env
                .parse("KAIROS_PORT")?
                .or(env.parse("PORT")?)
                .or(fc.server.port)
                .unwrap_or(8000),
            rate_limit_per_minute: env
                .parse("KAIROS_RATE_LIMIT")?
                .or(fc.server.rate_limit_per_minute)
                .filter(|n| *n > 0),
        };

        let hitl = Self::hitl_config(&env, fc.hitl)?;
        let gateway = Self::gateway_config(&env, fc.gateway)?;
        let presentation = Self::presentation_config(&env, fc.presentation)?;
        let recognition = Self::recognition_config(&env, fc.recognition)?;

        let database = DatabaseConfig {
            path: env
                .string("KAIROS_DB_PATH")
                .map(PathBuf::from)
                .or(fc.database.path)
                .or_else(default_db_path),
        };

        Ok(Self {
            server,
            hitl,
            gateway,
            presentation,
            recognition,
            database,
        })
    }

    fn hitl_config(env: &Env<'_>, fc: file::HitlFileConfig) -> Result<HitlConfig> {
        let defaults = Thresholds::default();
        // NLU_THRESHOLD is the name older deployments use for the auto-execute bar
        let high = env
            .parse("KAIROS_HIGH_THRESHOLD")?
            .or(env.parse("NLU_THRESHOLD")?)
            .or(fc.high_threshold)
            .unwrap_or(defaults.high);
        let low = env
            .parse("KAIROS_LOW_THRESHOLD")?
            .or(fc.low_threshold)
            .unwrap_or(defaults.low);
        let thresholds = Thresholds::new(low, high)?;

        let store_defaults = StoreConfig::default();
        let max_pending = env
            .parse("KAIROS_MAX_PENDING")?
            .or(fc.max_pending)
            .unwrap_or(store_defaults.max_pending);
        if max_pending == 0 {
            return Err(Error::Config("max_pending must be at least 1".to_string()));
        }

        Ok(HitlConfig {
            thresholds,
            ai_enabled: env
                .flag("KAIROS_AI_ENABLED")
                .or(fc.ai_enabled)
                .unwrap_or(true),
            disabled_mode: env
                .kind("KAIROS_DISABLED_MODE")?
                .or(fc.disabled_mode)
                .unwrap_or_default(),
            store: StoreConfig {
                ttl: env
                    .parse("KAIROS_PENDING_TTL_SECS")?
                    .or(fc.pending_ttl_secs)
                    .map_or(store_defaults.ttl, Duration::from_secs),
                grace: fc
                    .grace_secs
                    .map_or(store_defaults.grace, Duration::from_secs),
                max_pending,
            },
            sweep_interval: Duration::from_millis(fc.sweep_interval_ms.unwrap_or(1000).max(10)),
            event_buffer: fc.event_buffer.unwrap_or(crate::events::DEFAULT_SUBSCRIBER_BUFFER),
        })
    }

    fn gateway_config(env: &Env<'_>, fc: file::GatewayFileConfig) -> Result<GatewayConfig> {
        let defaults = GatewayConfig::default();
        let retry = RetryPolicy {
            max_retries: env
                .parse("KAIROS_MAX_RETRIES")?
                .or(fc.max_retries)
                .unwrap_or(defaults.retry.max_retries),
            base_delay: fc
                .base_delay_ms
                .map_or(defaults.retry.base_delay, Duration::from_millis),
            max_delay: fc
                .max_delay_ms
                .map_or(defaults.retry.max_delay, Duration::from_millis),
        };

        Ok(GatewayConfig {
            retry,
            deadline: env
                .parse("KAIROS_DEADLINE_MS")?
                .or(fc.deadline_ms)
                .map_or(defaults.deadline, Duration::from_millis),
            max_concurrency: fc
                .max_concurrency
                .unwrap_or(defaults.max_concurrency)
                .max(1),
            admission: env
                .kind::<AdmissionMode>("KAIROS_ADMISSION")?
                .or(fc.admission)
                .unwrap_or_default(),
        })
    }

    fn presentation_config(
        env: &Env<'_>,
        fc: file::PresentationFileConfig,
    ) -> Result<PresentationConfig> {
        let defaults = ProPresenterConfig::default();
        let propresenter = ProPresenterConfig {
            host: env
                .string("PROP_HOST")
                .or(fc.propresenter.host)
                .unwrap_or(defaults.host),
            port: env
                .parse("PROP_PORT")?
                .or(fc.propresenter.port)
                .unwrap_or(defaults.port),
            password: env
                .string("PROP_PASSWORD")
                .or(fc.propresenter.password)
                .map(SecretString::from),
            connect_timeout: defaults.connect_timeout,
        };

        let http = env
            .string("KAIROS_HTTP_BACKEND_URL")
            .or(fc.http.base_url)
            .map(|base| {
                let mut http = HttpBackendConfig::with_default_routes(base);
                http.health_route = fc.http.health_route;
                if let Some(ms) = fc.http.timeout_ms {
                    http.request_timeout = Duration::from_millis(ms);
                }
                http
            });

        let backend = env
            .kind("KAIROS_BACKEND")?
            .or(fc.backend)
            .unwrap_or_default();
        if backend == BackendKind::Http && http.is_none() {
            return Err(Error::Config(
                "http backend selected but no base URL configured (KAIROS_HTTP_BACKEND_URL)"
                    .to_string(),
            ));
        }

        Ok(PresentationConfig {
            backend,
            propresenter,
            http,
            heartbeat_interval: Duration::from_secs(fc.heartbeat_secs.unwrap_or(2).max(1)),
        })
    }

    fn recognition_config(
        env: &Env<'_>,
        fc: file::RecognitionFileConfig,
    ) -> Result<RecognitionConfig> {
        let nlu = env.kind("KAIROS_NLU")?.or(fc.nlu).unwrap_or_default();

        let dialogflow = match (
            env.string("DIALOGFLOW_PROJECT_ID").or(fc.dialogflow.project_id),
            env.string("DIALOGFLOW_AGENT_ID").or(fc.dialogflow.agent_id),
            env.string("DIALOGFLOW_ACCESS_TOKEN"),
        ) {
            (Some(project_id), Some(agent_id), Some(token)) => Some(DialogflowConfig {
                project_id,
                agent_id,
                location: env
                    .string("DIALOGFLOW_LOCATION")
                    .or(fc.dialogflow.location)
                    .unwrap_or_else(|| "us-central1".to_string()),
                language_code: env
                    .string("DIALOGFLOW_LANGUAGE")
                    .or(fc.dialogflow.language_code)
                    .unwrap_or_else(|| "en-US".to_string()),
                access_token: SecretString::from(token),
            }),
            _ => None,
        };
        if nlu == NluKind::Dialogflow && dialogflow.is_none() {
            return Err(Error::Config(
                "dialogflow NLU selected but DIALOGFLOW_PROJECT_ID, DIALOGFLOW_AGENT_ID and \
                 DIALOGFLOW_ACCESS_TOKEN are not all set"
                    .to_string(),
            ));
        }

        // API keys (env > toml > None)
        let openai = env.string("OPENAI_API_KEY").or(fc.api_keys.openai);
        let deepgram = env.string("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram);
        let provider = env.kind("KAIROS_STT")?.or(fc.stt).or_else(|| {
            if openai.is_some() {
                Some(SttKind::Whisper)
            } else if deepgram.is_some() {
                Some(SttKind::Deepgram)
            } else {
                None
            }
        });
        let model = env.string("KAIROS_STT_MODEL").or(fc.stt_model);
        let stt = match provider {
            Some(SttKind::Whisper) => {
                let key = openai.ok_or_else(|| {
                    Error::Config("whisper STT selected but OPENAI_API_KEY is not set".to_string())
                })?;
                Some(SttConfig {
                    provider: SttKind::Whisper,
                    api_key: SecretString::from(key),
                    model: model.unwrap_or_else(|| "whisper-1".to_string()),
                })
            }
            Some(SttKind::Deepgram) => {
                let key = deepgram.ok_or_else(|| {
                    Error::Config(
                        "deepgram STT selected but DEEPGRAM_API_KEY is not set".to_string(),
                    )
                })?;
                Some(SttConfig {
                    provider: SttKind::Deepgram,
                    api_key: SecretString::from(key),
                    model: model.unwrap_or_else(|| "nova-2".to_string()),
                })
            }
            None => None,
        };

        let acrcloud = match (
            env.string("ACRCLOUD_HOST").or(fc.acrcloud.host),
            env.string("ACRCLOUD_ACCESS_KEY").or(fc.acrcloud.access_key),
            env.string("ACRCLOUD_ACCESS_SECRET").or(fc.acrcloud.access_secret),
        ) {
            (Some(host), Some(access_key), Some(secret)) => Some(AcrCloudConfig {
                host,
                access_key,
                access_secret: SecretString::from(secret),
                timeout: Duration::from_millis(fc.acrcloud.timeout_ms.unwrap_or(6000)),
            }),
            _ => None,
        };

        Ok(RecognitionConfig {
            nlu,
            dialogflow,
            stt,
            acrcloud,
        })
    }
}

/// Default catalog location: `~/.local/share/kairos/kairos.db` on Linux
fn default_db_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.data_dir().join("kairos").join("kairos.db"))
}

/// Environment lookup with typed accessors
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        self.string(key)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|e| Error::Config(format!("{key}={v}: {e}")))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.string(key)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
    }

    /// Parse a kebab-case enum value
    fn kind<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        self.string(key)
            .map(|v| {
                let de: serde::de::value::StrDeserializer<'_, serde::de::value::Error> =
                    v.as_str().into_deserializer();
                T::deserialize(de).map_err(|e| Error::Config(format!("{key}={v}: {e}")))
            })
            .transpose()
    }
}

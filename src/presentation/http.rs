//! Generic HTTP presentation backend
//!
//! Posts `{command, parameters}` as JSON to a configurable route per action.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{BackendAction, BackendError, PresentationBackend};
use crate::gateway::retry::is_recoverable;
use crate::intent::{IntentName, Parameters};

/// HTTP backend settings
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL, e.g. `http://localhost:8080/`
    pub base_url: String,
    /// Route per action; actions without a route are rejected
    pub routes: HashMap<IntentName, String>,
    /// Optional health route used by `probe`
    pub health_route: Option<String>,
    pub request_timeout: Duration,
}

impl HttpBackendConfig {
    /// Config with `/{action}` routes for every action
    #[must_use]
    pub fn with_default_routes(base_url: impl Into<String>) -> Self {
        let routes = [
            IntentName::NextSlide,
            IntentName::PreviousSlide,
            IntentName::GoToSlide,
            IntentName::GoToSong,
            IntentName::GoToSection,
            IntentName::ClearScreen,
            IntentName::PlayPauseMedia,
        ]
        .into_iter()
        .map(|name| (name, format!("/{name}")))
        .collect();

        Self {
            base_url: base_url.into(),
            routes,
            health_route: None,
            request_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Serialize)]
struct CommandBody<'a> {
    command: IntentName,
    parameters: &'a Parameters,
}

/// HTTP backend
pub struct HttpBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    /// Create a new HTTP backend
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: HttpBackendConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }
}

/// Only a failed connect proves the request never left
fn transport_error(e: &reqwest::Error) -> BackendError {
    if e.is_connect() || e.is_builder() {
        BackendError::Transient(e.to_string())
    } else {
        BackendError::Unconfirmed(e.to_string())
    }
}

#[async_trait]
impl PresentationBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, action: &BackendAction) -> Result<serde_json::Value, BackendError> {
        let route = self.config.routes.get(&action.name).ok_or_else(|| {
            BackendError::Rejected(format!("no route configured for '{}'", action.name))
        })?;
        let url = self.url(route);

        tracing::debug!(url = %url, action = %action.name, "POST presentation command");

        let response = self
            .client
            .post(&url)
            .json(&CommandBody {
                command: action.name,
                parameters: &action.parameters,
            })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(&e))?;

        if !status.is_success() {
            tracing::warn!(status = %status, url = %url, "presentation backend error");
            let msg = format!("HTTP {status}: {body}");
            return Err(if is_recoverable(status.as_u16(), &body) {
                BackendError::Transient(msg)
            } else {
                BackendError::Rejected(msg)
            });
        }

        let payload = serde_json::from_str::<serde_json::Value>(&body)
            .unwrap_or_else(|_| serde_json::json!({ "ok": true, "raw": body }));

        if payload.get("ok").and_then(serde_json::Value::as_bool) == Some(false) {
            let error = payload
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("backend reported failure");
            return Err(BackendError::Rejected(error.to_string()));
        }

        Ok(payload)
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let Some(route) = &self.config.health_route else {
            return Ok(());
        };
        let response = self
            .client
            .get(self.url(route))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Transient(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }
}

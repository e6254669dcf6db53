//! Presentation backend clients
//!
//! Each backend implements [`PresentationBackend`]; the execution gateway is
//! the only caller.

mod dry_run;
mod http;
mod propresenter;

use async_trait::async_trait;
use serde::Serialize;

pub use dry_run::DryRunBackend;
pub use http::{HttpBackend, HttpBackendConfig};
pub use propresenter::{ProPresenterBackend, ProPresenterConfig};

use crate::intent::{Intent, IntentName, Parameters};

/// Command sent to a presentation backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendAction {
    pub name: IntentName,
    pub parameters: Parameters,
}

impl From<&Intent> for BackendAction {
    fn from(intent: &Intent) -> Self {
        Self {
            name: intent.name,
            parameters: intent.parameters.clone(),
        }
    }
}

impl BackendAction {
    fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn param_u64(&self, key: &str) -> Option<u64> {
        match self.parameters.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Backend call failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// Network-level or overload failure worth retrying
    #[error("transient: {0}")]
    Transient(String),

    /// Backend understood and refused the command
    #[error("rejected: {0}")]
    Rejected(String),

    /// Command may have been delivered but no answer was read; never retried
    #[error("unconfirmed: {0}")]
    Unconfirmed(String),
}

/// A presentation-control backend
#[async_trait]
pub trait PresentationBackend: Send + Sync {
    /// Short identifier for logs and health output
    fn name(&self) -> &'static str;

    /// Send one command; returns the backend's response payload
    async fn send(&self, action: &BackendAction) -> Result<serde_json::Value, BackendError>;

    /// Check reachability without side effects
    async fn probe(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

//! Backend that logs commands instead of sending them
//!
//! Used when no presentation software is configured, e.g. while rehearsing
//! recognition settings.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{BackendAction, BackendError, PresentationBackend};

/// Dry-run backend
#[derive(Debug, Default)]
pub struct DryRunBackend {
    sent: Mutex<Vec<BackendAction>>,
}

impl DryRunBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far, in order
    #[must_use]
    pub fn sent(&self) -> Vec<BackendAction> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PresentationBackend for DryRunBackend {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn send(&self, action: &BackendAction) -> Result<serde_json::Value, BackendError> {
        tracing::info!(action = %action.name, parameters = ?action.parameters, "dry-run command");
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action.clone());
        Ok(serde_json::json!({ "ok": true, "dry_run": true, "command": action.name }))
    }
}

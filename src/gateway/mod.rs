//! Execution gateway: the only path from an intent to the presentation backend
//!
//! A single `execute` call retries transient failures with backoff, runs
//! under a deadline, and is admitted through a bounded semaphore so a slow
//! backend cannot be flooded. The gateway does not deduplicate; at-most-once
//! execution per confirmation is enforced upstream by the pending store.

pub mod retry;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::intent::{Intent, IntentName};
use crate::presentation::{BackendAction, BackendError, PresentationBackend};

pub use retry::RetryPolicy;

/// Default deadline for one `execute` call, retries included
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Default number of concurrent backend calls
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// How excess concurrent executes are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionMode {
    /// Wait for a free slot
    #[default]
    Queue,
    /// Fail immediately with `overloaded`
    FailFast,
}

/// Gateway tuning
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub retry: RetryPolicy,
    pub deadline: Duration,
    pub max_concurrency: usize,
    pub admission: AdmissionMode,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            deadline: DEFAULT_DEADLINE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            admission: AdmissionMode::default(),
        }
    }
}

/// Outcome classification of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Executed,
    /// Backend rejected the command or retries were exhausted
    BackendFailure,
    /// Deadline exceeded or request unanswered; the backend may still have applied the command
    Timeout,
    /// Concurrency limit reached in fail-fast mode; nothing was sent
    Overloaded,
}

/// Outcome of dispatching an intent to the presentation backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub intent_id: Uuid,
    pub action: IntentName,
    pub ok: bool,
    pub status: ExecutionStatus,
    /// Backend payload on success, error description otherwise
    pub detail: serde_json::Value,
    pub attempts: u32,
}

impl ExecutionResult {
    /// The matching error unless the command executed
    ///
    /// # Errors
    ///
    /// `Overloaded`, `Timeout` or `BackendFailure` according to `status`
    pub fn into_result(self) -> crate::Result<Self> {
        let detail = match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self.status {
            ExecutionStatus::Executed => Ok(self),
            ExecutionStatus::Overloaded => Err(crate::Error::Overloaded),
            ExecutionStatus::Timeout => Err(crate::Error::Timeout(detail)),
            ExecutionStatus::BackendFailure => Err(crate::Error::BackendFailure(detail)),
        }
    }

    fn failed(
        intent_id: Uuid,
        action: IntentName,
        status: ExecutionStatus,
        detail: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            intent_id,
            action,
            ok: false,
            status,
            detail: serde_json::Value::String(detail.into()),
            attempts,
        }
    }
}

/// Backend reachability as last observed
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackendHealth {
    pub backend: &'static str,
    /// `None` until the first call or probe completes
    pub reachable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Execution gateway
pub struct ExecutionGateway {
    backend: Arc<dyn PresentationBackend>,
    config: GatewayConfig,
    permits: Arc<Semaphore>,
    health: Mutex<BackendHealth>,
}

impl ExecutionGateway {
    #[must_use]
    pub fn new(backend: Arc<dyn PresentationBackend>, config: GatewayConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        let health = Mutex::new(BackendHealth {
            backend: backend.name(),
            ..BackendHealth::default()
        });
        Self {
            backend,
            config,
            permits,
            health,
        }
    }

    /// Execute an intent against the backend
    ///
    /// Always returns a result; failures are classified in
    /// [`ExecutionResult::status`].
    pub async fn execute(&self, intent_id: Uuid, intent: &Intent) -> ExecutionResult {
        let action = BackendAction::from(intent);

        let Some(_permit) = self.admit().await else {
            tracing::warn!(
                intent_id = %intent_id,
                action = %action.name,
                "execution gateway overloaded"
            );
            return ExecutionResult::failed(
                intent_id,
                action.name,
                ExecutionStatus::Overloaded,
                "too many concurrent executions",
                0,
            );
        };

        let mut attempts = 0;
        let outcome = tokio::time::timeout(
            self.config.deadline,
            self.send_with_retry(&action, &mut attempts),
        )
        .await;

        match outcome {
            Ok(Ok(detail)) => {
                self.record_health(true, None);
                tracing::info!(
                    intent_id = %intent_id,
                    action = %action.name,
                    attempts,
                    "backend command executed"
                );
                ExecutionResult {
                    intent_id,
                    action: action.name,
                    ok: true,
                    status: ExecutionStatus::Executed,
                    detail,
                    attempts,
                }
            }
            Ok(Err(BackendError::Unconfirmed(e))) => {
                let msg = format!("{e}; backend state unconfirmed");
                self.record_health(false, Some(msg.clone()));
                tracing::warn!(
                    intent_id = %intent_id,
                    action = %action.name,
                    attempts,
                    error = %e,
                    "backend command outcome unknown"
                );
                ExecutionResult::failed(
                    intent_id,
                    action.name,
                    ExecutionStatus::Timeout,
                    msg,
                    attempts,
                )
            }
            Ok(Err(e)) => {
                // A rejection proves the backend answered
                let reachable = matches!(e, BackendError::Rejected(_));
                self.record_health(reachable, Some(e.to_string()));
                tracing::warn!(
                    intent_id = %intent_id,
                    action = %action.name,
                    attempts,
                    error = %e,
                    "backend command failed"
                );
                ExecutionResult::failed(
                    intent_id,
                    action.name,
                    ExecutionStatus::BackendFailure,
                    e.to_string(),
                    attempts,
                )
            }
            Err(_) => {
                let msg = format!(
                    "no answer within {:?}; backend state unconfirmed",
                    self.config.deadline
                );
                self.record_health(false, Some(msg.clone()));
                tracing::warn!(
                    intent_id = %intent_id,
                    action = %action.name,
                    attempts,
                    "backend command timed out"
                );
                ExecutionResult::failed(
                    intent_id,
                    action.name,
                    ExecutionStatus::Timeout,
                    msg,
                    attempts,
                )
            }
        }
    }

    /// Check backend reachability without sending a command
    pub async fn probe(&self) -> BackendHealth {
        match tokio::time::timeout(self.config.deadline, self.backend.probe()).await {
            Ok(Ok(())) => self.record_health(true, None),
            Ok(Err(e)) => self.record_health(false, Some(e.to_string())),
            Err(_) => self.record_health(false, Some("probe timed out".to_string())),
        }
        self.health()
    }

    /// Last observed backend health
    #[must_use]
    pub fn health(&self) -> BackendHealth {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        match self.config.admission {
            AdmissionMode::Queue => self.permits.clone().acquire_owned().await.ok(),
            AdmissionMode::FailFast => self.permits.clone().try_acquire_owned().ok(),
        }
    }

    async fn send_with_retry(
        &self,
        action: &BackendAction,
        attempts: &mut u32,
    ) -> Result<serde_json::Value, BackendError> {
        loop {
            *attempts += 1;
            match self.backend.send(action).await {
                Ok(detail) => return Ok(detail),
                Err(BackendError::Transient(msg)) if *attempts <= self.config.retry.max_retries => {
                    let delay = retry::delay_for_attempt(&self.config.retry, *attempts - 1);
                    tracing::debug!(
                        action = %action.name,
                        attempt = *attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %msg,
                        "transient backend error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn record_health(&self, reachable: bool, error: Option<String>) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        health.reachable = Some(reachable);
        health.last_error = error;
        health.last_checked_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::intent::IntentSource;

    /// Fails with the scripted errors, then succeeds
    struct Scripted {
        errors: Mutex<Vec<BackendError>>,
        calls: AtomicU32,
        delay: Duration,
    }

    impl Scripted {
        fn new(errors: Vec<BackendError>) -> Self {
            Self {
                errors: Mutex::new(errors),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl PresentationBackend for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn send(&self, action: &BackendAction) -> Result<serde_json::Value, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = {
                let mut errors = self.errors.lock().unwrap();
                if errors.is_empty() {
                    None
                } else {
                    Some(errors.remove(0))
                }
            };
            match next {
                Some(e) => Err(e),
                None => Ok(serde_json::json!({ "action": action.name })),
            }
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
            deadline: Duration::from_secs(2),
            max_concurrency: 2,
            admission: AdmissionMode::Queue,
        }
    }

    fn intent() -> Intent {
        Intent::new(IntentName::NextSlide, 0.95, IntentSource::Voice)
    }

    #[tokio::test]
    async fn success_marks_backend_reachable() {
        let backend = Arc::new(Scripted::new(vec![]));
        let gateway = ExecutionGateway::new(backend.clone(), config());
        assert_eq!(gateway.health().reachable, None);

        let id = Uuid::new_v4();
        let result = gateway.execute(id, &intent()).await;
        assert!(result.ok);
        assert_eq!(result.intent_id, id);
        assert_eq!(result.status, ExecutionStatus::Executed);
        assert_eq!(result.attempts, 1);
        assert_eq!(gateway.health().reachable, Some(true));
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let backend = Arc::new(Scripted::new(vec![
            BackendError::Transient("connection reset".into()),
            BackendError::Transient("connection reset".into()),
        ]));
        let gateway = ExecutionGateway::new(backend.clone(), config());
        let result = gateway.execute(Uuid::new_v4(), &intent()).await;
        assert!(result.ok);
        assert_eq!(result.attempts, 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let backend = Arc::new(Scripted::new(vec![
            BackendError::Transient("down".into()),
            BackendError::Transient("down".into()),
            BackendError::Transient("down".into()),
            BackendError::Transient("down".into()),
        ]));
        let gateway = ExecutionGateway::new(backend.clone(), config());
        let result = gateway.execute(Uuid::new_v4(), &intent()).await;
        assert!(!result.ok);
        assert_eq!(result.status, ExecutionStatus::BackendFailure);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(gateway.health().reachable, Some(false));
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let backend = Arc::new(Scripted::new(vec![BackendError::Rejected(
            "invalid slide number".into(),
        )]));
        let gateway = ExecutionGateway::new(backend.clone(), config());
        let result = gateway.execute(Uuid::new_v4(), &intent()).await;
        assert_eq!(result.status, ExecutionStatus::BackendFailure);
        assert_eq!(result.attempts, 1);
        assert!(result.detail.as_str().unwrap().contains("invalid slide number"));
        assert_eq!(gateway.health().reachable, Some(true));
    }

    #[tokio::test]
    async fn unconfirmed_delivery_is_not_retried() {
        let backend = Arc::new(Scripted::new(vec![BackendError::Unconfirmed(
            "operation timed out".into(),
        )]));
        let gateway = ExecutionGateway::new(backend.clone(), config());
        let result = gateway.execute(Uuid::new_v4(), &intent()).await;
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.attempts, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(result.detail.as_str().unwrap().contains("backend state unconfirmed"));
    }

    #[test]
    fn failed_statuses_become_errors() {
        let id = Uuid::new_v4();
        let failed = |status| ExecutionResult::failed(id, IntentName::NextSlide, status, "boom", 1);

        assert!(matches!(
            failed(ExecutionStatus::Overloaded).into_result(),
            Err(crate::Error::Overloaded)
        ));
        assert!(matches!(
            failed(ExecutionStatus::Timeout).into_result(),
            Err(crate::Error::Timeout(msg)) if msg == "boom"
        ));
        assert!(matches!(
            failed(ExecutionStatus::BackendFailure).into_result(),
            Err(crate::Error::BackendFailure(msg)) if msg == "boom"
        ));
    }

    #[tokio::test]
    async fn deadline_yields_timeout() {
        let mut slow = Scripted::new(vec![]);
        slow.delay = Duration::from_millis(200);
        let gateway = ExecutionGateway::new(
            Arc::new(slow),
            GatewayConfig {
                deadline: Duration::from_millis(20),
                ..config()
            },
        );
        let result = gateway.execute(Uuid::new_v4(), &intent()).await;
        assert!(!result.ok);
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(gateway.health().reachable, Some(false));
    }

    #[tokio::test]
    async fn fail_fast_admission_reports_overload() {
        let mut slow = Scripted::new(vec![]);
        slow.delay = Duration::from_millis(100);
        let gateway = Arc::new(ExecutionGateway::new(
            Arc::new(slow),
            GatewayConfig {
                max_concurrency: 1,
                admission: AdmissionMode::FailFast,
                ..config()
            },
        ));

        let g = gateway.clone();
        let first = tokio::spawn(async move { g.execute(Uuid::new_v4(), &intent()).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = gateway.execute(Uuid::new_v4(), &intent()).await;

        assert_eq!(second.status, ExecutionStatus::Overloaded);
        assert_eq!(second.attempts, 0);
        assert!(first.await.unwrap().ok);
    }
}

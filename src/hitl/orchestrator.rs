//! Intent orchestrator
//!
//! Entry point for every recognized intent. Routes through the confidence
//! policy, parks medium-confidence intents in the pending store, and is the
//! only caller of the execution gateway.
//!
//! Store, AI toggle and thresholds live behind one mutex. It is held only
//! for the synchronous decide/add/resolve steps and never across an
//! `.await`; backend calls happen after the transition has committed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::policy::{ConfidencePolicy, RejectReason, Routing, Thresholds};
use super::store::{Decision, PendingConfirmation, PendingStore, StoreError};
use crate::events::{EventBus, HitlEvent, Subscription};
use crate::gateway::{BackendHealth, ExecutionGateway, ExecutionResult};
use crate::intent::Intent;
use crate::{Error, Result};

/// What happened to a submitted intent
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Auto-executed; check `result.ok` for the backend outcome
    Executed { result: ExecutionResult },
    /// Waiting on the operator
    Pending { pending: PendingConfirmation },
    /// Dropped without side effects
    Rejected { reason: RejectReason },
}

impl SubmitOutcome {
    /// Fails when an auto-execution did not go through
    ///
    /// # Errors
    ///
    /// See [`ExecutionResult::into_result`]
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Executed { result } => Ok(Self::Executed {
                result: result.into_result()?,
            }),
            other => Ok(other),
        }
    }
}

struct Core {
    store: PendingStore,
    policy: ConfidencePolicy,
}

/// Intent orchestrator
pub struct Orchestrator {
    core: Mutex<Core>,
    gateway: Arc<ExecutionGateway>,
    events: Arc<EventBus>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: PendingStore,
        policy: ConfidencePolicy,
        gateway: Arc<ExecutionGateway>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            core: Mutex::new(Core { store, policy }),
            gateway,
            events,
        }
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route a recognized intent
    ///
    /// # Errors
    ///
    /// `InvalidIntent` if validation fails, `CapacityExceeded` if the
    /// intent needs confirmation and the store is full
    pub async fn submit(&self, intent: Intent) -> Result<SubmitOutcome> {
        intent.validate()?;

        let routing = {
            let mut core = self.core();
            let routing = core.policy.decide(&intent);
            match routing {
                Routing::Confirm => {
                    let pending = core.store.add(intent.clone(), Utc::now())?;
                    // Published under the lock so no decision on this id is announced first
                    self.events.publish(HitlEvent::NewPending {
                        pending: pending.clone(),
                    });
                    drop(core);

                    tracing::info!(
                        id = %pending.id,
                        action = %intent.name,
                        confidence = intent.confidence,
                        "intent awaiting confirmation"
                    );
                    return Ok(SubmitOutcome::Pending { pending });
                }
                other => other,
            }
        };

        match routing {
            Routing::Reject(reason) => {
                tracing::info!(
                    action = %intent.name,
                    confidence = intent.confidence,
                    reason = ?reason,
                    "intent rejected"
                );
                self.events.publish(HitlEvent::Rejected { intent, reason });
                Ok(SubmitOutcome::Rejected { reason })
            }
            _ => {
                let result = self.gateway.execute(Uuid::new_v4(), &intent).await;
                self.publish_result(&result);
                Ok(SubmitOutcome::Executed { result })
            }
        }
    }

    /// Operator approves a pending intent
    ///
    /// The backend is called at most once per id no matter how many
    /// confirms race; losers get `NotFound`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown, already resolved or expired
    pub async fn confirm(&self, id: Uuid) -> Result<ExecutionResult> {
        let entry = self.resolve(id, Decision::Confirmed)?;
        self.events.publish(HitlEvent::Confirmed { id });
        tracing::info!(id = %id, action = %entry.intent.name, "intent confirmed");

        let result = self.gateway.execute(id, &entry.intent).await;

        if let Err(e) = self
            .core()
            .store
            .record_outcome(id, result.clone(), Utc::now())
        {
            // Evicted between confirm and completion; the result still stands
            tracing::debug!(id = %id, error = %e, "could not record outcome");
        }
        self.publish_result(&result);
        Ok(result)
    }

    /// Operator discards a pending intent
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown, already resolved or expired
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        self.resolve(id, Decision::Canceled)?;
        tracing::info!(id = %id, "intent canceled");
        self.events.publish(HitlEvent::Canceled { id });
        Ok(())
    }

    /// Expire overdue confirmations; returns the ids that expired
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let sweep = self.core().store.sweep_expired(now);

        if sweep.evicted > 0 {
            tracing::debug!(evicted = sweep.evicted, "evicted resolved confirmations");
        }

        sweep
            .expired
            .into_iter()
            .map(|entry| {
                tracing::info!(id = %entry.id, action = %entry.intent.name, "confirmation expired");
                self.events.publish(HitlEvent::Expired {
                    id: entry.id,
                    intent: entry.intent,
                });
                entry.id
            })
            .collect()
    }

    /// Flip the operator kill switch
    pub fn set_ai_enabled(&self, enabled: bool) {
        let changed = {
            let mut core = self.core();
            let changed = core.policy.ai_enabled() != enabled;
            core.policy.set_ai_enabled(enabled);
            changed
        };
        if changed {
            tracing::info!(enabled, "AI toggled");
            self.events.publish(HitlEvent::AiToggled { enabled });
        }
    }

    #[must_use]
    pub fn ai_enabled(&self) -> bool {
        self.core().policy.ai_enabled()
    }

    /// Replace the confidence thresholds
    pub fn set_thresholds(&self, thresholds: Thresholds) {
        self.core().policy.set_thresholds(thresholds);
        tracing::info!(low = thresholds.low, high = thresholds.high, "thresholds changed");
        self.events
            .publish(HitlEvent::ThresholdsChanged { thresholds });
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.core().policy.thresholds()
    }

    /// Policy snapshot (thresholds, toggle, disabled mode)
    #[must_use]
    pub fn policy(&self) -> ConfidencePolicy {
        self.core().policy
    }

    /// Confirmations waiting on the operator, oldest first
    #[must_use]
    pub fn pending(&self) -> Vec<PendingConfirmation> {
        self.core().store.list_pending()
    }

    /// Look up a confirmation in any state
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<PendingConfirmation> {
        self.core().store.get(id).cloned()
    }

    #[must_use]
    pub fn max_pending(&self) -> usize {
        self.core().store.max_pending()
    }

    #[must_use]
    pub fn backend_health(&self) -> BackendHealth {
        self.gateway.health()
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<ExecutionGateway> {
        &self.gateway
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    fn resolve(&self, id: Uuid, decision: Decision) -> Result<PendingConfirmation> {
        let resolved = self.core().store.resolve(id, decision, Utc::now());
        match resolved {
            Ok(entry) => Ok(entry),
            Err(StoreError::Expired(entry)) => {
                tracing::info!(id = %id, "confirmation expired before resolution");
                self.events.publish(HitlEvent::Expired {
                    id,
                    intent: entry.intent.clone(),
                });
                Err(Error::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn publish_result(&self, result: &ExecutionResult) {
        let event = if result.ok {
            HitlEvent::Executed {
                result: result.clone(),
            }
        } else {
            HitlEvent::Failed {
                result: result.clone(),
            }
        };
        self.events.publish(event);
    }
}

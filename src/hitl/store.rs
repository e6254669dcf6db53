//! Pending-confirmation store
//!
//! Holds intents waiting on an operator decision. The store itself is a
//! plain state machine; callers serialize access to it (the orchestrator
//! keeps it behind a single mutex together with the AI toggle), which is
//! what makes `resolve` race-free: exactly one of confirm, cancel or expiry
//! moves an entry out of `pending`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::gateway::ExecutionResult;
use crate::intent::Intent;

/// Default time an intent may wait for the operator
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default time terminal entries stay visible before eviction
pub const DEFAULT_GRACE: Duration = Duration::from_secs(300);

/// Default maximum outstanding pending confirmations
pub const DEFAULT_MAX_PENDING: usize = 32;

/// Lifecycle state of a pending confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    Pending,
    Confirmed,
    Canceled,
    Expired,
    Executed,
    Failed,
}

impl PendingState {
    /// No further transitions are possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Expired | Self::Executed | Self::Failed
        )
    }
}

/// Operator decision on a pending entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirmed,
    Canceled,
}

/// An intent awaiting operator decision
#[derive(Debug, Clone, Serialize)]
pub struct PendingConfirmation {
    pub id: Uuid,
    pub intent: Intent,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: PendingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecutionResult>,
}

/// Store failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("pending capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },

    #[error("no pending confirmation {0}")]
    NotFound(Uuid),

    /// Entry had passed its deadline when resolution was attempted;
    /// it is now `expired`
    #[error("pending confirmation {} expired", .0.id)]
    Expired(Box<PendingConfirmation>),
}

impl From<StoreError> for crate::Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CapacityExceeded { max } => Self::CapacityExceeded { max },
            StoreError::NotFound(id) => Self::NotFound(id.to_string()),
            StoreError::Expired(p) => Self::NotFound(p.id.to_string()),
        }
    }
}

/// Store limits
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub ttl: Duration,
    pub grace: Duration,
    pub max_pending: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            grace: DEFAULT_GRACE,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// Result of an expiry sweep
#[derive(Debug, Default)]
pub struct Sweep {
    /// Entries that moved `pending -> expired` in this sweep
    pub expired: Vec<PendingConfirmation>,
    /// Terminal entries dropped after the grace period
    pub evicted: usize,
}

/// In-memory pending-confirmation store
#[derive(Debug)]
pub struct PendingStore {
    entries: HashMap<Uuid, PendingConfirmation>,
    ttl: chrono::Duration,
    grace: chrono::Duration,
    max_pending: usize,
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365))
}

impl PendingStore {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: to_chrono(config.ttl),
            grace: to_chrono(config.grace),
            max_pending: config.max_pending,
        }
    }

    /// Register an intent in state `pending`
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` when `max_pending` entries are outstanding
    pub fn add(
        &mut self,
        intent: Intent,
        now: DateTime<Utc>,
    ) -> Result<PendingConfirmation, StoreError> {
        if self.pending_len() >= self.max_pending {
            return Err(StoreError::CapacityExceeded {
                max: self.max_pending,
            });
        }

        let entry = PendingConfirmation {
            id: Uuid::new_v4(),
            intent,
            created_at: now,
            expires_at: now + self.ttl,
            state: PendingState::Pending,
            resolved_at: None,
            outcome: None,
        };
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    /// Move a pending entry to the operator's decision
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or already-resolved ids; `Expired` when the
    /// deadline passed before the sweep caught it
    pub fn resolve(
        &mut self,
        id: Uuid,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<PendingConfirmation, StoreError> {
        let entry = self
            .entries
            .get_mut(&id)
            .filter(|e| e.state == PendingState::Pending)
            .ok_or(StoreError::NotFound(id))?;

        if entry.expires_at <= now {
            entry.state = PendingState::Expired;
            entry.resolved_at = Some(now);
            return Err(StoreError::Expired(Box::new(entry.clone())));
        }

        entry.state = match decision {
            Decision::Confirmed => PendingState::Confirmed,
            Decision::Canceled => PendingState::Canceled,
        };
        entry.resolved_at = Some(now);
        Ok(entry.clone())
    }

    /// Record the execution outcome of a confirmed entry
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless the entry is `confirmed`
    pub fn record_outcome(
        &mut self,
        id: Uuid,
        result: ExecutionResult,
        now: DateTime<Utc>,
    ) -> Result<PendingConfirmation, StoreError> {
        let entry = self
            .entries
            .get_mut(&id)
            .filter(|e| e.state == PendingState::Confirmed)
            .ok_or(StoreError::NotFound(id))?;

        entry.state = if result.ok {
            PendingState::Executed
        } else {
            PendingState::Failed
        };
        entry.resolved_at = Some(now);
        entry.outcome = Some(result);
        Ok(entry.clone())
    }

    /// Expire overdue entries and evict terminal ones past the grace period
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Sweep {
        let mut sweep = Sweep::default();

        for entry in self.entries.values_mut() {
            if entry.state == PendingState::Pending && entry.expires_at <= now {
                entry.state = PendingState::Expired;
                entry.resolved_at = Some(now);
                sweep.expired.push(entry.clone());
            }
        }

        let grace = self.grace;
        let before = self.entries.len();
        self.entries.retain(|_, e| {
            !(e.state.is_terminal() && e.resolved_at.is_some_and(|at| at + grace <= now))
        });
        sweep.evicted = before - self.entries.len();

        sweep.expired.sort_by_key(|e| e.created_at);
        sweep
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&PendingConfirmation> {
        self.entries.get(&id)
    }

    /// Entries still waiting on the operator, oldest first
    #[must_use]
    pub fn list_pending(&self) -> Vec<PendingConfirmation> {
        let mut pending: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.state == PendingState::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.created_at);
        pending
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.state == PendingState::Pending)
            .count()
    }

    /// Entries in any state, including terminal ones awaiting eviction
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn max_pending(&self) -> usize {
        self.max_pending
    }
}

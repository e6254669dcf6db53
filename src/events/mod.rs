//! HITL event bus
//!
//! Broadcasts state transitions to connected observers (the operator
//! dashboard). Publishing is synchronous and never blocks: each subscriber
//! reads from a bounded ring, and a subscriber that falls behind loses the
//! oldest events and receives a [`Notification::Gap`] in their place so it
//! can refetch state instead of trusting an incomplete stream.
//!
//! Dropping a [`Subscription`] unsubscribes.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

use crate::gateway::{BackendHealth, ExecutionResult};
use crate::hitl::{PendingConfirmation, RejectReason, Thresholds};
use crate::intent::Intent;

/// Default per-subscriber buffer
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// A state transition observers care about
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HitlEvent {
    /// Intent is waiting on the operator
    NewPending { pending: PendingConfirmation },
    Confirmed { id: Uuid },
    Canceled { id: Uuid },
    Expired { id: Uuid, intent: Intent },
    Executed { result: ExecutionResult },
    Failed { result: ExecutionResult },
    Rejected { intent: Intent, reason: RejectReason },
    AiToggled { enabled: bool },
    ThresholdsChanged { thresholds: Thresholds },
    /// Periodic backend reachability heartbeat
    BackendStatus { health: BackendHealth },
}

impl HitlEvent {
    /// Event type name as serialized
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewPending { .. } => "new_pending",
            Self::Confirmed { .. } => "confirmed",
            Self::Canceled { .. } => "canceled",
            Self::Expired { .. } => "expired",
            Self::Executed { .. } => "executed",
            Self::Failed { .. } => "failed",
            Self::Rejected { .. } => "rejected",
            Self::AiToggled { .. } => "ai_toggled",
            Self::ThresholdsChanged { .. } => "thresholds_changed",
            Self::BackendStatus { .. } => "backend_status",
        }
    }
}

/// A published event with its sequence number
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Monotonic across the bus, starting at 1
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: HitlEvent,
}

/// What a subscriber receives
#[derive(Debug, Clone)]
pub enum Notification {
    Event(Arc<EventEnvelope>),
    /// `missed` events were dropped because this subscriber fell behind
    Gap { missed: u64 },
}

/// Event bus
pub struct EventBus {
    tx: broadcast::Sender<Arc<EventEnvelope>>,
    seq: Mutex<u64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl EventBus {
    /// Create a bus whose subscribers buffer up to `buffer` events each
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            seq: Mutex::new(0),
        }
    }

    /// Publish an event to all current subscribers (fire-and-forget)
    ///
    /// Returns the assigned sequence number.
    pub fn publish(&self, event: HitlEvent) -> u64 {
        // Sequence assignment and send happen together so every
        // subscriber observes sequence order
        let mut seq = self.seq.lock().unwrap_or_else(PoisonError::into_inner);
        *seq += 1;

        tracing::debug!(seq = *seq, kind = event.kind(), "publishing event");

        let envelope = Arc::new(EventEnvelope {
            seq: *seq,
            timestamp: Utc::now(),
            event,
        });
        // No subscribers is fine
        let _ = self.tx.send(envelope);
        *seq
    }

    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Sequence number of the most recent event (0 if none)
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        *self.seq.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One observer's view of the bus
pub struct Subscription {
    rx: broadcast::Receiver<Arc<EventEnvelope>>,
}

impl Subscription {
    /// Wait for the next notification; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<Notification> {
        match self.rx.recv().await {
            Ok(envelope) => Some(Notification::Event(envelope)),
            Err(RecvError::Lagged(missed)) => Some(Notification::Gap { missed }),
            Err(RecvError::Closed) => None,
        }
    }

    /// Next notification if one is ready
    pub fn try_recv(&mut self) -> Option<Notification> {
        match self.rx.try_recv() {
            Ok(envelope) => Some(Notification::Event(envelope)),
            Err(TryRecvError::Lagged(missed)) => Some(Notification::Gap { missed }),
            Err(TryRecvError::Empty | TryRecvError::Closed) => None,
        }
    }

    /// Lazy stream of notifications
    pub fn into_stream(self) -> impl Stream<Item = Notification> + Send + Unpin {
        BroadcastStream::new(self.rx).map(|item| match item {
            Ok(envelope) => Notification::Event(envelope),
            Err(BroadcastStreamRecvError::Lagged(missed)) => Notification::Gap { missed },
        })
    }
}

//! Human-in-the-loop confirmation pipeline

pub mod orchestrator;
pub mod policy;
pub mod store;

pub use orchestrator::{Orchestrator, SubmitOutcome};
pub use policy::{ConfidencePolicy, DisabledMode, RejectReason, Routing, Thresholds};
pub use store::{
    Decision, PendingConfirmation, PendingState, PendingStore, StoreConfig, StoreError, Sweep,
};

//! Kairos Gateway - voice, text and music-ID control for live presentations
//!
//! Recognized intents are routed by confidence: high-confidence commands
//! execute immediately, uncertain ones wait for an operator, and the rest
//! are dropped. Everything that happens is published to operator dashboards.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Intake                          │
//! │   Text (NLU)  │  Speech (STT)  │  Music ID  │  API  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ Intent
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Orchestrator                       │
//! │  Confidence Policy │ Pending Store │ Event Bus      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Execution Gateway                     │
//! │  ProPresenter  │  HTTP  │  Dry run                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod events;
pub mod gateway;
pub mod hitl;
pub mod intake;
pub mod intent;
pub mod presentation;
pub mod recognition;

pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use events::{EventBus, HitlEvent};
pub use gateway::{ExecutionGateway, ExecutionResult, ExecutionStatus};
pub use hitl::{Orchestrator, SubmitOutcome};
pub use intake::Intake;
pub use intent::{Intent, IntentName, IntentSource};

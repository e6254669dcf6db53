//! Operator dashboard feed over WebSocket
//!
//! A client receives a `connected` snapshot, then every HITL event as its
//! serialized envelope (`seq`, `timestamp`, `type`, ...). Events published
//! between subscribing and taking the snapshot can appear in both; clients
//! drop envelopes with `seq <= snapshot.seq`. A lagging client gets a single
//! `gap` message instead of the events it missed.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{ApiError, ApiState};
use crate::events::{EventEnvelope, Notification};
use crate::gateway::ExecutionResult;
use crate::hitl::{PendingConfirmation, Thresholds};

/// Incoming WebSocket message from the dashboard
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    Confirm { id: Uuid },
    Cancel { id: Uuid },
    SetAi { enabled: bool },
    /// Ping to keep connection alive
    Ping,
}

/// Outgoing WebSocket message that is not a bus event
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    /// Connection established; state as of `seq`
    Connected {
        pending: Vec<PendingConfirmation>,
        ai_enabled: bool,
        thresholds: Thresholds,
        seq: u64,
    },
    /// Events were dropped for this client
    Gap { missed: u64 },
    /// Outcome of a `confirm` sent on this socket
    ConfirmResult { id: Uuid, result: ExecutionResult },
    /// A command from this socket failed
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Uuid>,
        code: String,
        message: String,
    },
    Pong,
}

/// Anything written to the socket
enum Frame {
    Reply(WsOutgoing),
    Event(Arc<EventEnvelope>),
}

impl Frame {
    fn to_text(&self) -> serde_json::Result<String> {
        match self {
            Self::Reply(msg) => serde_json::to_string(msg),
            Self::Event(envelope) => serde_json::to_string(envelope.as_ref()),
        }
    }
}

impl From<Notification> for Frame {
    fn from(n: Notification) -> Self {
        match n {
            Notification::Event(envelope) => Self::Event(envelope),
            Notification::Gap { missed } => Self::Reply(WsOutgoing::Gap { missed }),
        }
    }
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/hitl", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let orchestrator = Arc::clone(&state.orchestrator);

    let mut subscription = orchestrator.subscribe();
    let policy = orchestrator.policy();
    let connected = WsOutgoing::Connected {
        pending: orchestrator.pending(),
        ai_enabled: policy.ai_enabled(),
        thresholds: policy.thresholds(),
        seq: orchestrator.events().last_seq(),
    };
    if let Ok(msg) = serde_json::to_string(&connected) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    tracing::info!(subscribers = orchestrator.events().subscriber_count(), "dashboard connected");

    let (tx, mut rx) = mpsc::channel::<Frame>(32);

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = frame.to_text() else { continue };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let events_tx = tx.clone();
    let mut event_task = tokio::spawn(async move {
        while let Some(notification) = subscription.recv().await {
            if events_tx.send(notification.into()).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_message(&text, &state, &tx).await,
                Message::Close(_) => {
                    tracing::debug!("dashboard closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            event_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
            event_task.abort();
        }
        _ = &mut event_task => {
            send_task.abort();
            recv_task.abort();
        }
    }

    tracing::info!("dashboard disconnected");
}

/// Handle a single incoming message
async fn handle_message(text: &str, state: &Arc<ApiState>, tx: &mpsc::Sender<Frame>) {
    let incoming: WsIncoming = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            let _ = tx.send(Frame::Reply(error_reply(None, "invalid_message", e.to_string()))).await;
            return;
        }
    };

    match incoming {
        WsIncoming::Ping => {
            let _ = tx.send(Frame::Reply(WsOutgoing::Pong)).await;
        }
        WsIncoming::SetAi { enabled } => state.orchestrator.set_ai_enabled(enabled),
        WsIncoming::Cancel { id } => {
            if let Err(e) = state.orchestrator.cancel(id) {
                let _ = tx.send(Frame::Reply(api_error_reply(id, e))).await;
            }
        }
        WsIncoming::Confirm { id } => {
            // Execution can take a while; keep reading commands meanwhile
            let orchestrator = Arc::clone(&state.orchestrator);
            let tx = tx.clone();
            tokio::spawn(async move {
                let reply = match orchestrator.confirm(id).await {
                    Ok(result) => WsOutgoing::ConfirmResult { id, result },
                    Err(e) => api_error_reply(id, e),
                };
                let _ = tx.send(Frame::Reply(reply)).await;
            });
        }
    }
}

fn api_error_reply(id: Uuid, e: crate::Error) -> WsOutgoing {
    let err = ApiError(e);
    error_reply(Some(id), err.code(), err.0.to_string())
}

fn error_reply(id: Option<Uuid>, code: &str, message: String) -> WsOutgoing {
    WsOutgoing::Error {
        id,
        code: code.to_string(),
        message,
    }
}

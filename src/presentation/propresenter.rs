//! ProPresenter 7 remote-protocol client over WebSocket
//!
//! Connects to `ws://{host}:{port}/remote`, authenticates, and sends control
//! actions. A dropped connection surfaces as a transient error; the next
//! attempt reconnects.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{BackendAction, BackendError, PresentationBackend};
use crate::intent::IntentName;

/// Remote protocol version sent during authentication
const PROTOCOL_VERSION: &str = "701";

/// How long to wait for an acknowledgement frame
const ACK_WAIT: Duration = Duration::from_millis(200);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// ProPresenter connection settings
#[derive(Debug, Clone)]
pub struct ProPresenterConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<SecretString>,
    pub connect_timeout: Duration,
}

impl Default for ProPresenterConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 53535,
            password: None,
            connect_timeout: Duration::from_secs(3),
        }
    }
}

/// ProPresenter backend
pub struct ProPresenterBackend {
    config: ProPresenterConfig,
    socket: Mutex<Option<Socket>>,
}

impl ProPresenterBackend {
    #[must_use]
    pub fn new(config: ProPresenterConfig) -> Self {
        Self {
            config,
            socket: Mutex::new(None),
        }
    }

    fn url(&self) -> String {
        format!("ws://{}:{}/remote", self.config.host, self.config.port)
    }

    async fn connect(&self) -> Result<Socket, BackendError> {
        let url = self.url();
        let (mut socket, _) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await
        .map_err(|_| BackendError::Transient(format!("connect to {url} timed out")))?
        .map_err(|e| BackendError::Transient(format!("connect to {url}: {e}")))?;

        let auth = json!({
            "action": "authenticate",
            "protocol": PROTOCOL_VERSION,
            "password": self
                .config
                .password
                .as_ref()
                .map_or("", |p| p.expose_secret()),
            "deviceName": "Kairos",
            "application": "remote",
        });
        socket
            .send(Message::Text(auth.to_string()))
            .await
            .map_err(|e| BackendError::Transient(format!("authenticate: {e}")))?;

        if let Some(reply) = read_ack(&mut socket).await {
            if reply.get("authenticated").and_then(serde_json::Value::as_i64) == Some(0) {
                let reason = reply
                    .get("error")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("authentication refused");
                return Err(BackendError::Rejected(reason.to_string()));
            }
        }

        tracing::info!(url = %url, "connected to ProPresenter");
        Ok(socket)
    }
}

/// Read one JSON frame if the backend answers promptly
async fn read_ack(socket: &mut Socket) -> Option<serde_json::Value> {
    match tokio::time::timeout(ACK_WAIT, socket.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

/// Translate an action into a remote-protocol message
fn remote_message(action: &BackendAction) -> Result<serde_json::Value, BackendError> {
    let msg = match action.name {
        IntentName::NextSlide => json!({ "action": "presentationTriggerNext" }),
        IntentName::PreviousSlide => json!({ "action": "presentationTriggerPrevious" }),
        IntentName::ClearScreen => json!({ "action": "clearAll" }),
        IntentName::PlayPauseMedia => json!({ "action": "mediaPlayPause" }),
        IntentName::GoToSong => {
            let path = action.param_str("identifier").ok_or_else(|| {
                BackendError::Rejected("go-to-song without presentation identifier".to_string())
            })?;
            json!({
                "action": "presentationTriggerIndex",
                "presentationPath": path,
                "slideIndex": 0,
            })
        }
        IntentName::GoToSlide => {
            let slide = action
                .param_u64("slide")
                .filter(|n| *n > 0)
                .ok_or_else(|| BackendError::Rejected("invalid slide number".to_string()))?;
            let mut msg = json!({
                "action": "presentationTriggerIndex",
                "slideIndex": slide - 1,
            });
            if let Some(path) = action.param_str("identifier") {
                msg["presentationPath"] = json!(path);
            }
            msg
        }
        IntentName::GoToSection => {
            let section = action
                .param_str("section")
                .ok_or_else(|| BackendError::Rejected("missing section".to_string()))?;
            json!({ "action": "presentationTriggerGroup", "groupName": section })
        }
    };
    Ok(msg)
}

#[async_trait]
impl PresentationBackend for ProPresenterBackend {
    fn name(&self) -> &'static str {
        "propresenter"
    }

    async fn send(&self, action: &BackendAction) -> Result<serde_json::Value, BackendError> {
        let msg = remote_message(action)?;

        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(socket) = guard.as_mut() else {
            return Err(BackendError::Transient("not connected".to_string()));
        };

        if let Err(e) = socket.send(Message::Text(msg.to_string())).await {
            *guard = None;
            return Err(BackendError::Transient(format!("send failed: {e}")));
        }

        let ack = read_ack(socket).await;
        if let Some(error) = ack
            .as_ref()
            .and_then(|a| a.get("error"))
            .and_then(serde_json::Value::as_str)
        {
            return Err(BackendError::Rejected(error.to_string()));
        }

        Ok(json!({ "sent": msg, "ack": ack }))
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Parameters;

    fn action(name: IntentName, params: &[(&str, serde_json::Value)]) -> BackendAction {
        let parameters: Parameters = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        BackendAction { name, parameters }
    }

    #[test]
    fn maps_simple_actions() {
        let msg = remote_message(&action(IntentName::NextSlide, &[])).unwrap();
        assert_eq!(msg["action"], "presentationTriggerNext");
        let msg = remote_message(&action(IntentName::ClearScreen, &[])).unwrap();
        assert_eq!(msg["action"], "clearAll");
    }

    #[test]
    fn go_to_slide_is_zero_based() {
        let msg = remote_message(&action(IntentName::GoToSlide, &[("slide", json!(12))])).unwrap();
        assert_eq!(msg["action"], "presentationTriggerIndex");
        assert_eq!(msg["slideIndex"], 11);
        assert!(msg.get("presentationPath").is_none());
    }

    #[test]
    fn go_to_song_needs_identifier() {
        let err = remote_message(&action(IntentName::GoToSong, &[("song_title", json!("Oceans"))]));
        assert!(matches!(err, Err(BackendError::Rejected(_))));

        let msg = remote_message(&action(
            IntentName::GoToSong,
            &[("identifier", json!("Library/Oceans.pro"))],
        ))
        .unwrap();
        assert_eq!(msg["presentationPath"], "Library/Oceans.pro");
        assert_eq!(msg["slideIndex"], 0);
    }

    #[test]
    fn section_maps_to_group_trigger() {
        let msg = remote_message(&action(IntentName::GoToSection, &[("section", json!("chorus"))]))
            .unwrap();
        assert_eq!(msg["groupName"], "chorus");
    }

    #[tokio::test]
    async fn unreachable_host_is_transient() {
        let backend = ProPresenterBackend::new(ProPresenterConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            password: None,
            connect_timeout: Duration::from_millis(500),
        });
        let err = backend
            .send(&action(IntentName::NextSlide, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transient(_)));
    }
}

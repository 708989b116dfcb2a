use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Activity state the server reports for a session.
///
/// The server only ever emits `idle`, `busy`, and `retry` today; anything
/// it grows later is folded into `Busy` so an unknown tag reads as "still
/// working" rather than breaking the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Busy,
    Retry,
}

impl SessionStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "idle" => SessionStatus::Idle,
            "retry" => SessionStatus::Retry,
            _ => SessionStatus::Busy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Busy => "busy",
            SessionStatus::Retry => "retry",
        }
    }
}

/// One message in a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub info: MessageInfo,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub role: String,
}

/// A message part. Only text parts carry extractable output; tool calls,
/// reasoning traces and attachments are opaque here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

impl SessionMessage {
    pub fn is_assistant(&self) -> bool {
        self.info.role == "assistant"
    }

    /// Concatenated text parts, newline separated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Toast notification forwarded to the host UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub message: String,
    pub variant: String,
    /// Display time in milliseconds.
    pub duration: u64,
}

impl Toast {
    pub fn success(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            variant: "success".to_string(),
            duration: 3000,
        }
    }
}

/// An event from the server's event feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl ServerEvent {
    pub const SESSION_IDLE: &'static str = "session.idle";

    /// Session id carried by session-scoped events, if present.
    pub fn session_id(&self) -> Option<&str> {
        self.properties.get("sessionID").and_then(|v| v.as_str())
    }
}

/// What the coordinator needs from the session server.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a session and return its id.
    async fn create_session(&self, title: &str) -> Result<String>;

    /// Send a prompt into a session as the given agent. Resolves when the
    /// server finishes the turn.
    async fn prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<()>;

    /// Activity state of every session the server is currently tracking.
    /// Sessions the server has released do not appear at all.
    async fn session_status(&self) -> Result<HashMap<String, SessionStatus>>;

    /// Ordered transcript of a session.
    async fn messages(&self, session_id: &str) -> Result<Vec<SessionMessage>>;

    /// Best-effort abort of a session's in-flight work.
    async fn abort(&self, session_id: &str) -> Result<()>;
}

/// Sink for user-facing notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn toast(&self, toast: &Toast) -> Result<()>;
}

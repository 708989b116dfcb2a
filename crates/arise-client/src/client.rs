//! OpenCode REST API client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use arise_config::AriseConfig;
use arise_core::{Notifier, SessionMessage, SessionService, SessionStatus, Toast};

/// Timeout for ordinary API calls. Prompt dispatch is exempt because a
/// turn can run for minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the OpenCode HTTP API.
pub struct OpenCodeClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    config: Arc<AriseConfig>,
}

/// Session entry from the server's session list.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct CreatedSession {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusEntry {
    #[serde(rename = "type", default)]
    status_type: String,
}

impl OpenCodeClient {
    /// Build a client for the given server url.
    pub fn new(base_url: &str, config: Arc<AriseConfig>) -> Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("invalid server url: {base_url}"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// All sessions the server knows about.
    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let url = self.endpoint("/session");
        let resp = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        if !resp.status().is_success() {
            return Err(error_body(&url, resp).await);
        }
        resp.json().await.context("decoding session list")
    }
}

#[async_trait]
impl SessionService for OpenCodeClient {
    async fn create_session(&self, title: &str) -> Result<String> {
        let url = self.endpoint("/session");
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "title": title }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        if !resp.status().is_success() {
            return Err(error_body(&url, resp).await);
        }
        let created: CreatedSession = resp.json().await.context("decoding created session")?;
        Ok(created.id)
    }

    async fn prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<()> {
        let mut body = serde_json::json!({
            "agent": agent,
            "parts": [{ "type": "text", "text": text }],
        });
        if let Some(model) = self.config.model_override(agent) {
            match split_model(model) {
                Some((provider, model_id)) => {
                    body["model"] = serde_json::json!({
                        "providerID": provider,
                        "modelID": model_id,
                    });
                }
                None => debug!("Ignoring malformed model override for {agent}: {model}"),
            }
        }

        // No timeout here: the server holds the request open for the
        // whole turn.
        let url = self.endpoint(&format!("/session/{session_id}/message"));
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        if !resp.status().is_success() {
            return Err(error_body(&url, resp).await);
        }
        Ok(())
    }

    async fn session_status(&self) -> Result<HashMap<String, SessionStatus>> {
        let url = self.endpoint("/session/status");
        let resp = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        if !resp.status().is_success() {
            return Err(error_body(&url, resp).await);
        }
        let raw: HashMap<String, StatusEntry> =
            resp.json().await.context("decoding session status")?;
        Ok(raw
            .into_iter()
            .map(|(id, entry)| (id, SessionStatus::from_str(&entry.status_type)))
            .collect())
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<SessionMessage>> {
        let url = self.endpoint(&format!("/session/{session_id}/message"));
        let resp = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        if !resp.status().is_success() {
            return Err(error_body(&url, resp).await);
        }
        resp.json().await.context("decoding session messages")
    }

    async fn abort(&self, session_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("/session/{session_id}/abort"));
        let resp = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        if !resp.status().is_success() {
            return Err(error_body(&url, resp).await);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for OpenCodeClient {
    async fn toast(&self, toast: &Toast) -> Result<()> {
        let url = self.endpoint("/tui/show-toast");
        let resp = self
            .http
            .post(&url)
            .json(toast)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        if !resp.status().is_success() {
            return Err(error_body(&url, resp).await);
        }
        Ok(())
    }
}

async fn error_body(url: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::anyhow!("{url} returned {status}: {body}")
}

/// Split a `provider/model` string into its two halves.
fn split_model(model: &str) -> Option<(&str, &str)> {
    let (provider, model_id) = model.split_once('/')?;
    if provider.is_empty() || model_id.is_empty() {
        return None;
    }
    Some((provider, model_id))
}

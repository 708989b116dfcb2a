//! SSE subscription to the server's event feed.

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use arise_core::ServerEvent;

use crate::client::OpenCodeClient;

/// A live subscription to the server's event feed.
///
/// Dropping the receiver stops the reader task; aborting the reader drops
/// the underlying connection.
pub struct EventSubscription {
    pub events: mpsc::Receiver<ServerEvent>,
    pub reader: JoinHandle<()>,
}

impl OpenCodeClient {
    /// Open the server's SSE feed and stream parsed events.
    pub async fn subscribe_events(&self) -> Result<EventSubscription> {
        let url = self.endpoint("/event");
        let resp = self
            .http
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        if !resp.status().is_success() {
            anyhow::bail!("{url} returned {}", resp.status());
        }

        let (tx, rx) = mpsc::channel(64);
        let reader = tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("Event stream closed: {err}");
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                for line in drain_lines(&mut buffer) {
                    if let Some(event) = parse_sse_line(&line) {
                        if tx.send(event).await.is_err() {
                            debug!("Event receiver dropped, stopping reader");
                            return;
                        }
                    }
                }
            }
        });

        Ok(EventSubscription { events: rx, reader })
    }
}

/// Pull every complete line out of the buffer, leaving any partial line.
fn drain_lines(buffer: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.find('\n') {
        let line: String = buffer.drain(..=pos).collect();
        lines.push(line.trim_end_matches(['\n', '\r']).to_string());
    }
    lines
}

/// Parse one SSE line. Only `data:` lines carry events; comments,
/// field lines, and blank separators are skipped.
fn parse_sse_line(line: &str) -> Option<ServerEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str(data) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!("Skipping unparseable event payload: {err}");
            None
        }
    }
}

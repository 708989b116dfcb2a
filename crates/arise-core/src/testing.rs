//! In-memory doubles for the session service and the notifier, shared by
//! the coordinator and tool tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::coordinator::TaskCoordinator;
use crate::session::{
    MessageInfo, MessagePart, Notifier, ServerEvent, SessionMessage, SessionService,
    SessionStatus, Toast,
};
use crate::task::Task;

#[derive(Default)]
pub(crate) struct MockSessions {
    pub(crate) fail_create: bool,
    pub(crate) blank_session_id: bool,
    pub(crate) fail_prompt: bool,
    pub(crate) fail_status: bool,
    pub(crate) fail_messages: bool,
    pub(crate) fail_abort: bool,
    /// Each status query pops one entry; `Some(s)` reports every created
    /// session as `s`, `None` (or an exhausted script) reports an empty
    /// map.
    pub(crate) statuses: StdMutex<VecDeque<Option<SessionStatus>>>,
    pub(crate) messages: StdMutex<Vec<SessionMessage>>,
    pub(crate) titles: StdMutex<Vec<String>>,
    pub(crate) prompts: StdMutex<Vec<(String, String, String)>>,
    pub(crate) created: AtomicUsize,
    pub(crate) status_calls: AtomicUsize,
    pub(crate) abort_calls: AtomicUsize,
}

impl MockSessions {
    pub(crate) fn script_statuses(&self, entries: &[Option<SessionStatus>]) {
        *self.statuses.lock().unwrap() = entries.iter().copied().collect();
    }

    pub(crate) fn set_messages(&self, messages: Vec<SessionMessage>) {
        *self.messages.lock().unwrap() = messages;
    }

    pub(crate) fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionService for MockSessions {
    async fn create_session(&self, title: &str) -> Result<String> {
        if self.fail_create {
            anyhow::bail!("server unreachable");
        }
        self.titles.lock().unwrap().push(title.to_string());
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        if self.blank_session_id {
            return Ok(String::new());
        }
        Ok(format!("ses_{n}"))
    }

    async fn prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<()> {
        self.prompts.lock().unwrap().push((
            session_id.to_string(),
            agent.to_string(),
            text.to_string(),
        ));
        if self.fail_prompt {
            anyhow::bail!("prompt rejected");
        }
        Ok(())
    }

    async fn session_status(&self) -> Result<HashMap<String, SessionStatus>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status {
            anyhow::bail!("status endpoint down");
        }
        let next = self.statuses.lock().unwrap().pop_front().flatten();
        let mut map = HashMap::new();
        if let Some(status) = next {
            for i in 0..self.created.load(Ordering::SeqCst) {
                map.insert(format!("ses_{i}"), status);
            }
        }
        Ok(map)
    }

    async fn messages(&self, _session_id: &str) -> Result<Vec<SessionMessage>> {
        if self.fail_messages {
            anyhow::bail!("history unavailable");
        }
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn abort(&self, _session_id: &str) -> Result<()> {
        self.abort_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_abort {
            anyhow::bail!("abort failed");
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockNotifier {
    pub(crate) fail: bool,
    pub(crate) toasts: StdMutex<Vec<Toast>>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn toast(&self, toast: &Toast) -> Result<()> {
        self.toasts.lock().unwrap().push(toast.clone());
        if self.fail {
            anyhow::bail!("no tui");
        }
        Ok(())
    }
}

pub(crate) fn assistant(text: &str) -> SessionMessage {
    SessionMessage {
        info: MessageInfo {
            role: "assistant".to_string(),
        },
        parts: vec![MessagePart::Text {
            text: text.to_string(),
        }],
    }
}

pub(crate) fn user(text: &str) -> SessionMessage {
    SessionMessage {
        info: MessageInfo {
            role: "user".to_string(),
        },
        parts: vec![MessagePart::Text {
            text: text.to_string(),
        }],
    }
}

pub(crate) fn idle_event(session_id: &str) -> ServerEvent {
    ServerEvent {
        event_type: "session.idle".to_string(),
        properties: serde_json::json!({ "sessionID": session_id }),
    }
}

/// Coordinator with a poll delay short enough for tests.
pub(crate) fn fast_coordinator(
    sessions: &Arc<MockSessions>,
    notifier: &Arc<MockNotifier>,
) -> TaskCoordinator {
    TaskCoordinator::new(sessions.clone(), notifier.clone())
        .with_poll_interval(Duration::from_millis(10))
}

/// Coordinator with the default 2s poll delay; timer polls never fire
/// within a test, so only explicit triggers move tasks.
pub(crate) fn slow_coordinator(
    sessions: &Arc<MockSessions>,
    notifier: &Arc<MockNotifier>,
) -> TaskCoordinator {
    TaskCoordinator::new(sessions.clone(), notifier.clone())
}

pub(crate) async fn wait_until<F>(coordinator: &TaskCoordinator, task_id: &str, pred: F) -> Task
where
    F: Fn(&Task) -> bool,
{
    for _ in 0..200 {
        if let Some(task) = coordinator.get_task(task_id).await {
            if pred(&task) {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} never reached the expected state");
}

pub(crate) async fn wait_for_prompt(sessions: &MockSessions) {
    for _ in 0..200 {
        if sessions.prompt_count() > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("prompt was never dispatched");
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::LaunchError;
use crate::session::{Notifier, ServerEvent, SessionService, SessionStatus, Toast};
use crate::shadows::ShadowKind;
use crate::task::{generate_task_id, Task, TaskStatus};

/// Delay between completion polls for a running task.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Registry of background tasks, keyed by id, remembering launch order.
/// Tasks are never removed; terminal tasks stay queryable.
#[derive(Default)]
struct TaskRegistry {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
}

impl TaskRegistry {
    fn insert(&mut self, task: Task) {
        self.order.push(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
    }

    fn snapshot(&self) -> Vec<Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id).cloned())
            .collect()
    }
}

/// Tracks delegated shadow sessions as background tasks: launches them
/// without blocking the caller, polls the server until each session goes
/// idle, extracts the shadow's answer and hands out task snapshots.
///
/// Cloning is cheap; clones share one registry.
#[derive(Clone)]
pub struct TaskCoordinator {
    registry: Arc<Mutex<TaskRegistry>>,
    sessions: Arc<dyn SessionService>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
}

impl TaskCoordinator {
    pub fn new(sessions: Arc<dyn SessionService>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(TaskRegistry::default())),
            sessions,
            notifier,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the delay between completion polls. The default is
    /// [`POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Launch a shadow in its own session and track it as a background
    /// task. Returns as soon as the session exists; the prompt is
    /// dispatched from a spawned future and polling starts only after the
    /// server accepts it.
    pub async fn launch(
        &self,
        shadow: ShadowKind,
        prompt: &str,
        description: &str,
        parent_session_id: &str,
    ) -> Result<Task, LaunchError> {
        let task_id = generate_task_id();

        let title = format!("[arise:{task_id}] {description}");
        let session_id = self
            .sessions
            .create_session(&title)
            .await
            .map_err(|source| LaunchError::SessionCreate { source })?;
        if session_id.is_empty() {
            return Err(LaunchError::NoSessionId);
        }

        let task = Task {
            id: task_id.clone(),
            session_id: session_id.clone(),
            parent_session_id: parent_session_id.to_string(),
            shadow,
            description: description.to_string(),
            status: TaskStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        };
        self.registry.lock().await.insert(task.clone());
        info!("Launched {shadow} task {task_id} in session {session_id}");

        let coordinator = self.clone();
        let prompt = prompt.to_string();
        tokio::spawn(async move {
            match coordinator
                .sessions
                .prompt(&session_id, shadow.as_str(), &prompt)
                .await
            {
                Ok(()) => coordinator.schedule_poll(&task_id),
                Err(err) => {
                    coordinator.fail_task(&task_id, &format!("{err:#}")).await;
                }
            }
        });

        Ok(task)
    }

    /// Snapshot of one task.
    pub async fn get_task(&self, task_id: &str) -> Option<Task> {
        self.registry.lock().await.tasks.get(task_id).cloned()
    }

    /// Snapshots of every task, in launch order.
    pub async fn all_tasks(&self) -> Vec<Task> {
        self.registry.lock().await.snapshot()
    }

    /// Tasks launched from the given session, in launch order.
    pub async fn tasks_for_session(&self, parent_session_id: &str) -> Vec<Task> {
        self.registry
            .lock()
            .await
            .snapshot()
            .into_iter()
            .filter(|task| task.parent_session_id == parent_session_id)
            .collect()
    }

    /// Cancel a running task: best-effort abort of its session, then an
    /// `Error` transition with reason `Cancelled`. Returns false when the
    /// task does not exist or already finished.
    pub async fn cancel(&self, task_id: &str) -> bool {
        let session_id = match self.running_session(task_id).await {
            Some(id) => id,
            None => return false,
        };

        if let Err(err) = self.sessions.abort(&session_id).await {
            debug!("Abort for task {task_id} ignored: {err:#}");
        }

        let cancelled = self
            .finish_if_running(task_id, |task| {
                task.status = TaskStatus::Error;
                task.error = Some("Cancelled".to_string());
            })
            .await;

        match cancelled {
            Some(_) => {
                info!("Cancelled task {task_id}");
                true
            }
            None => false,
        }
    }

    /// React to a server event. `session.idle` lets a matching task finish
    /// ahead of its next poll tick; everything else is ignored.
    pub async fn handle_event(&self, event: &ServerEvent) {
        if event.event_type != ServerEvent::SESSION_IDLE {
            return;
        }
        let session_id = match event.session_id() {
            Some(id) => id.to_string(),
            None => return,
        };

        let matching: Vec<String> = {
            let registry = self.registry.lock().await;
            registry
                .order
                .iter()
                .filter(|id| {
                    registry
                        .tasks
                        .get(*id)
                        .map(|task| {
                            task.status == TaskStatus::Running && task.session_id == session_id
                        })
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        };

        for task_id in matching {
            self.poll_task(&task_id).await;
        }
    }

    fn schedule_poll(&self, task_id: &str) {
        let coordinator = self.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.poll_interval).await;
            coordinator.poll_task(&task_id).await;
        });
    }

    /// One poll tick: query the aggregate session status and decide. Both
    /// the timer and the event path run this; a task that already left
    /// `Running` makes it a no-op.
    async fn poll_task(&self, task_id: &str) {
        let session_id = match self.running_session(task_id).await {
            Some(id) => id,
            None => return,
        };

        match self.sessions.session_status().await {
            Ok(statuses) => match statuses.get(&session_id) {
                Some(SessionStatus::Busy) | Some(SessionStatus::Retry) => {
                    debug!("Task {task_id} still working, will poll again");
                    self.schedule_poll(task_id);
                }
                // An idle session, or one the server no longer tracks, is
                // done.
                Some(SessionStatus::Idle) | None => self.complete_task(task_id).await,
            },
            Err(err) => {
                self.fail_task(task_id, &format!("{err:#}")).await;
            }
        }
    }

    async fn complete_task(&self, task_id: &str) {
        let session_id = match self.running_session(task_id).await {
            Some(id) => id,
            None => return,
        };

        // The history fetch happens outside the lock; the transition below
        // re-checks that nothing else finished the task in the meantime.
        let result = self.extract_result(&session_id).await;

        let finished = self
            .finish_if_running(task_id, |task| {
                task.status = TaskStatus::Completed;
                task.result = Some(result);
            })
            .await;

        if let Some(task) = finished {
            info!("Task {task_id} completed in {}s", task.duration_secs());
            self.notify_parent(&task).await;
        }
    }

    async fn fail_task(&self, task_id: &str, message: &str) {
        let failed = self
            .finish_if_running(task_id, |task| {
                task.status = TaskStatus::Error;
                task.error = Some(message.to_string());
            })
            .await;
        if failed.is_some() {
            warn!("Task {task_id} failed: {message}");
        }
    }

    /// Session id of a task that is still running, if any.
    async fn running_session(&self, task_id: &str) -> Option<String> {
        let registry = self.registry.lock().await;
        registry
            .tasks
            .get(task_id)
            .filter(|task| task.status == TaskStatus::Running)
            .map(|task| task.session_id.clone())
    }

    /// Apply a terminal transition if the task is still running. This is
    /// the single critical section all transitions go through: whichever
    /// of the timer, event, and cancel paths gets here first wins, and the
    /// rest observe a terminal task and back off.
    async fn finish_if_running<F>(&self, task_id: &str, apply: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut registry = self.registry.lock().await;
        match registry.tasks.get_mut(task_id) {
            Some(task) if task.status == TaskStatus::Running => {
                apply(task);
                task.completed_at = Some(Utc::now());
                Some(task.clone())
            }
            _ => None,
        }
    }

    /// Pull the shadow's answer out of the session transcript. Never fails
    /// the task: every fault degrades to a placeholder string.
    async fn extract_result(&self, session_id: &str) -> String {
        let messages = match self.sessions.messages(session_id).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!("Could not fetch transcript for session {session_id}: {err:#}");
                return "(Failed to retrieve result)".to_string();
            }
        };

        match messages.iter().rev().find(|m| m.is_assistant()) {
            Some(message) => {
                let text = message.text();
                if text.is_empty() {
                    "(No response)".to_string()
                } else {
                    text
                }
            }
            None => "(No assistant response)".to_string(),
        }
    }

    async fn notify_parent(&self, task: &Task) {
        let toast = Toast::success(
            "Shadow Complete",
            &format!(
                "{} finished: {} ({}s)",
                task.shadow,
                task.description,
                task.duration_secs()
            ),
        );
        if let Err(err) = self.notifier.toast(&toast).await {
            debug!("Toast delivery failed: {err:#}");
        }
    }
}

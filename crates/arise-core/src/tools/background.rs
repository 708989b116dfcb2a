//! Tools for launching and tracking background shadow tasks.

use anyhow::Result;
use async_trait::async_trait;

use crate::coordinator::TaskCoordinator;
use crate::shadows::ShadowKind;
use crate::task::TaskStatus;
use crate::tools::{str_arg, Tool};

/// Launch a shadow as a tracked background task.
pub struct BackgroundTaskTool {
    coordinator: TaskCoordinator,
}

impl BackgroundTaskTool {
    pub fn new(coordinator: TaskCoordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for BackgroundTaskTool {
    fn name(&self) -> &str {
        "arise_background"
    }

    fn description(&self) -> &str {
        "Launch a shadow soldier as a background task for parallel execution.\n\n\
         Best for:\n\
         - beru: Parallel codebase exploration\n\
         - tank: Parallel external research\n\
         - bellion: Parallel planning/analysis\n\n\
         Returns a task_id immediately. Use arise_background_output to get results later."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "shadow": {
                    "type": "string",
                    "enum": ["beru", "tank", "bellion"],
                    "description": "Which shadow to run in background"
                },
                "prompt": {
                    "type": "string",
                    "description": "The task for the shadow"
                },
                "description": {
                    "type": "string",
                    "description": "Short description (3-5 words)"
                }
            },
            "required": ["shadow", "prompt", "description"]
        })
    }

    async fn execute(&self, params: serde_json::Value, session_id: &str) -> Result<String> {
        let shadow_name = str_arg(&params, "shadow");
        let prompt = str_arg(&params, "prompt");
        let description = str_arg(&params, "description");

        let shadow = match ShadowKind::from_str(shadow_name).filter(ShadowKind::background_capable)
        {
            Some(shadow) => shadow,
            None => {
                return Ok(format!(
                    "[arise] Failed to launch background task: '{shadow_name}' cannot run in background"
                ))
            }
        };

        match self
            .coordinator
            .launch(shadow, prompt, description, session_id)
            .await
        {
            Ok(task) => Ok(format!(
                "[arise] Shadow {shadow} launched in background.\n\n\
                 Task ID: {id}\n\
                 Description: {description}\n\n\
                 Use arise_background_output(\"{id}\") when you need the result.",
                id = task.id
            )),
            Err(err) => Ok(format!("[arise] Failed to launch background task: {err}")),
        }
    }
}

/// Fetch the current output of a background task.
pub struct BackgroundOutputTool {
    coordinator: TaskCoordinator,
}

impl BackgroundOutputTool {
    pub fn new(coordinator: TaskCoordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for BackgroundOutputTool {
    fn name(&self) -> &str {
        "arise_background_output"
    }

    fn description(&self) -> &str {
        "Get the output from a background shadow task."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "The task ID from arise_background"
                }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _session_id: &str) -> Result<String> {
        let task_id = str_arg(&params, "task_id");

        let task = match self.coordinator.get_task(task_id).await {
            Some(task) => task,
            None => return Ok(format!("[arise] Task not found: {task_id}")),
        };

        let duration = task.duration_secs();
        Ok(match task.status {
            TaskStatus::Running => {
                format!("[arise] Task still running ({duration}s). Check again later.")
            }
            TaskStatus::Error => format!(
                "[arise] Task failed: {}",
                task.error.as_deref().unwrap_or("Unknown error")
            ),
            TaskStatus::Completed => format!(
                "[arise] {} completed ({duration}s):\n\n{}",
                task.shadow,
                task.result.as_deref().unwrap_or("(No output)")
            ),
        })
    }
}

/// List background tasks and their status.
pub struct BackgroundStatusTool {
    coordinator: TaskCoordinator,
}

impl BackgroundStatusTool {
    pub fn new(coordinator: TaskCoordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for BackgroundStatusTool {
    fn name(&self) -> &str {
        "arise_background_status"
    }

    fn description(&self) -> &str {
        "List all background tasks and their status."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "current_session_only": {
                    "type": "boolean",
                    "description": "Only show tasks from current session"
                }
            }
        })
    }

    async fn execute(&self, params: serde_json::Value, session_id: &str) -> Result<String> {
        let current_only = params
            .get("current_session_only")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let tasks = if current_only {
            self.coordinator.tasks_for_session(session_id).await
        } else {
            self.coordinator.all_tasks().await
        };

        if tasks.is_empty() {
            return Ok("[arise] No background tasks.".to_string());
        }

        let lines: Vec<String> = tasks
            .iter()
            .map(|t| {
                format!(
                    "- {}: {} | {} | {} ({}s)",
                    t.id,
                    t.shadow,
                    t.status.as_str(),
                    t.description,
                    t.duration_secs()
                )
            })
            .collect();
        Ok(format!("[arise] Background tasks:\n{}", lines.join("\n")))
    }
}

/// Cancel a running background task.
pub struct BackgroundCancelTool {
    coordinator: TaskCoordinator,
}

impl BackgroundCancelTool {
    pub fn new(coordinator: TaskCoordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for BackgroundCancelTool {
    fn name(&self) -> &str {
        "arise_background_cancel"
    }

    fn description(&self) -> &str {
        "Cancel a running background task."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "The task ID to cancel"
                }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _session_id: &str) -> Result<String> {
        let task_id = str_arg(&params, "task_id");

        if self.coordinator.cancel(task_id).await {
            Ok(format!("[arise] Task {task_id} cancelled."))
        } else {
            Ok("[arise] Could not cancel task (not found or already completed).".to_string())
        }
    }
}

//! Direct shadow summoning, synchronous or backgrounded.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use arise_config::AriseConfig;

use crate::coordinator::TaskCoordinator;
use crate::session::SessionService;
use crate::shadows::ShadowKind;
use crate::tools::{str_arg, Tool};

/// Summon a shadow for one task. Synchronous summons block until the
/// shadow replies; backgrounded summons become tracked coordinator tasks.
pub struct SummonTool {
    coordinator: TaskCoordinator,
    sessions: Arc<dyn SessionService>,
    config: Arc<AriseConfig>,
}

impl SummonTool {
    pub fn new(
        coordinator: TaskCoordinator,
        sessions: Arc<dyn SessionService>,
        config: Arc<AriseConfig>,
    ) -> Self {
        Self {
            coordinator,
            sessions,
            config,
        }
    }

    async fn summon_sync(&self, shadow: ShadowKind, prompt: &str, task_desc: &str) -> String {
        let title = format!("[arise] {task_desc}");
        let session_id = match self.sessions.create_session(&title).await {
            Ok(id) => id,
            Err(err) => return format!("[arise] Failed to summon {shadow}: {err:#}"),
        };
        if session_id.is_empty() {
            return format!("[arise] Failed to create session for {shadow}");
        }

        if let Err(err) = self.sessions.prompt(&session_id, shadow.as_str(), prompt).await {
            return format!("[arise] Failed to summon {shadow}: {err:#}");
        }

        let messages = match self.sessions.messages(&session_id).await {
            Ok(messages) => messages,
            Err(err) => return format!("[arise] Failed to summon {shadow}: {err:#}"),
        };

        match messages.iter().rev().find(|m| m.is_assistant()) {
            Some(reply) => {
                let text = reply.text();
                let text = if text.is_empty() {
                    "(No text response)".to_string()
                } else {
                    text
                };
                format!("[arise] {shadow} reports:\n\n{text}")
            }
            None => format!("[arise] {shadow} completed but returned no message."),
        }
    }
}

#[async_trait]
impl Tool for SummonTool {
    fn name(&self) -> &str {
        "arise_summon"
    }

    fn description(&self) -> &str {
        "Invoke a shadow soldier to perform a specific task.\n\n\
         Available shadows:\n\
         - beru: Fast codebase scout (exploration, grep, file discovery)\n\
         - igris: Precise implementation (code changes, running commands)\n\
         - bellion: Strategic planning (architecture, complex analysis)\n\
         - tusk: UI/UX specialist (frontend, styling, components)\n\
         - tank: External research (docs, web search, examples)\n\
         - shadow-sovereign: Deep reasoning (complex debugging, architecture decisions)\n\n\
         Use run_in_background=true for parallel execution (recommended for exploration/research).\n\
         Use run_in_background=false when you need the result immediately."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "shadow": {
                    "type": "string",
                    "enum": ["beru", "igris", "bellion", "tusk", "tank", "shadow-sovereign"],
                    "description": "Which shadow to summon"
                },
                "prompt": {
                    "type": "string",
                    "description": "The task/question for the shadow (be specific)"
                },
                "run_in_background": {
                    "type": "boolean",
                    "description": "true = async (parallel), false = sync (wait for result)"
                },
                "description": {
                    "type": "string",
                    "description": "Short description of the task (for tracking)"
                }
            },
            "required": ["shadow", "prompt", "run_in_background"]
        })
    }

    async fn execute(&self, params: serde_json::Value, session_id: &str) -> Result<String> {
        let shadow_name = str_arg(&params, "shadow");
        let prompt = str_arg(&params, "prompt");
        let background = params
            .get("run_in_background")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let shadow = match ShadowKind::from_str(shadow_name).filter(ShadowKind::summonable) {
            Some(shadow) => shadow,
            None => return Ok(format!("[arise] Unknown shadow: {shadow_name}")),
        };
        if self.config.shadow_disabled(shadow.as_str()) {
            return Ok(format!(
                "[arise] Shadow {shadow} is disabled in configuration."
            ));
        }

        let task_desc = match params.get("description").and_then(|v| v.as_str()) {
            Some(desc) => desc.to_string(),
            None => format!("{shadow} task"),
        };

        if background {
            return Ok(
                match self
                    .coordinator
                    .launch(shadow, prompt, &task_desc, session_id)
                    .await
                {
                    Ok(task) => format!(
                        "[arise] Summoned {shadow} in background.\n\
                         Task: {task_desc}\n\
                         Task ID: {}\n\
                         Session ID: {}\n\n\
                         The shadow is working. Continue with your work.",
                        task.id, task.session_id
                    ),
                    Err(err) => format!("[arise] Failed to summon {shadow}: {err}"),
                },
            );
        }

        Ok(self.summon_sync(shadow, prompt, &task_desc).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::testing::{assistant, slow_coordinator, user, MockNotifier, MockSessions};

    fn summon_tool(
        sessions: &Arc<MockSessions>,
        config: AriseConfig,
    ) -> (SummonTool, TaskCoordinator) {
        let notifier = Arc::new(MockNotifier::default());
        let coordinator = slow_coordinator(sessions, &notifier);
        let tool = SummonTool::new(coordinator.clone(), sessions.clone(), Arc::new(config));
        (tool, coordinator)
    }

    #[tokio::test]
    async fn test_sync_summon_reports_last_assistant() {
        let sessions = Arc::new(MockSessions::default());
        sessions.set_messages(vec![user("question"), assistant("the answer")]);
        let (tool, coordinator) = summon_tool(&sessions, AriseConfig::default());

        let out = tool
            .execute(
                serde_json::json!({
                    "shadow": "igris",
                    "prompt": "fix the bug",
                    "run_in_background": false
                }),
                "parent",
            )
            .await
            .unwrap();

        assert_eq!(out, "[arise] igris reports:\n\nthe answer");
        assert_eq!(
            *sessions.titles.lock().unwrap(),
            vec!["[arise] igris task".to_string()]
        );
        assert_eq!(
            *sessions.prompts.lock().unwrap(),
            vec![(
                "ses_0".to_string(),
                "igris".to_string(),
                "fix the bug".to_string()
            )]
        );
        // Synchronous summons never become tracked tasks.
        assert!(coordinator.all_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_summon_uses_description_for_title() {
        let sessions = Arc::new(MockSessions::default());
        sessions.set_messages(vec![assistant("ok")]);
        let (tool, _) = summon_tool(&sessions, AriseConfig::default());

        tool.execute(
            serde_json::json!({
                "shadow": "tusk",
                "prompt": "style it",
                "run_in_background": false,
                "description": "polish the header"
            }),
            "parent",
        )
        .await
        .unwrap();

        assert_eq!(
            *sessions.titles.lock().unwrap(),
            vec!["[arise] polish the header".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sync_summon_empty_reply_placeholder() {
        let sessions = Arc::new(MockSessions::default());
        sessions.set_messages(vec![assistant("")]);
        let (tool, _) = summon_tool(&sessions, AriseConfig::default());

        let out = tool
            .execute(
                serde_json::json!({"shadow": "igris", "prompt": "p", "run_in_background": false}),
                "parent",
            )
            .await
            .unwrap();
        assert_eq!(out, "[arise] igris reports:\n\n(No text response)");
    }

    #[tokio::test]
    async fn test_sync_summon_without_assistant_message() {
        let sessions = Arc::new(MockSessions::default());
        sessions.set_messages(vec![user("hm")]);
        let (tool, _) = summon_tool(&sessions, AriseConfig::default());

        let out = tool
            .execute(
                serde_json::json!({"shadow": "beru", "prompt": "p", "run_in_background": false}),
                "parent",
            )
            .await
            .unwrap();
        assert_eq!(out, "[arise] beru completed but returned no message.");
    }

    #[tokio::test]
    async fn test_sync_summon_failures_surface() {
        let sessions = Arc::new(MockSessions {
            fail_create: true,
            ..Default::default()
        });
        let (tool, _) = summon_tool(&sessions, AriseConfig::default());
        let out = tool
            .execute(
                serde_json::json!({"shadow": "igris", "prompt": "p", "run_in_background": false}),
                "parent",
            )
            .await
            .unwrap();
        assert_eq!(out, "[arise] Failed to summon igris: server unreachable");

        let sessions = Arc::new(MockSessions {
            blank_session_id: true,
            ..Default::default()
        });
        let (tool, _) = summon_tool(&sessions, AriseConfig::default());
        let out = tool
            .execute(
                serde_json::json!({"shadow": "igris", "prompt": "p", "run_in_background": false}),
                "parent",
            )
            .await
            .unwrap();
        assert_eq!(out, "[arise] Failed to create session for igris");
    }

    #[tokio::test]
    async fn test_background_summon_registers_task() {
        let sessions = Arc::new(MockSessions::default());
        let (tool, coordinator) = summon_tool(&sessions, AriseConfig::default());

        let out = tool
            .execute(
                serde_json::json!({
                    "shadow": "tank",
                    "prompt": "dig into docs",
                    "run_in_background": true,
                    "description": "doc dive"
                }),
                "parent_9",
            )
            .await
            .unwrap();

        let tasks = coordinator.all_tasks().await;
        let task = &tasks[0];
        assert_eq!(
            out,
            format!(
                "[arise] Summoned tank in background.\nTask: doc dive\nTask ID: {}\nSession ID: {}\n\nThe shadow is working. Continue with your work.",
                task.id, task.session_id
            )
        );
        assert_eq!(task.parent_session_id, "parent_9");
        assert_eq!(task.session_id, "ses_0");
        assert_eq!(
            *sessions.titles.lock().unwrap(),
            vec![format!("[arise:{}] doc dive", task.id)]
        );
    }

    #[tokio::test]
    async fn test_background_summon_failure_surfaces() {
        let sessions = Arc::new(MockSessions {
            fail_create: true,
            ..Default::default()
        });
        let (tool, _) = summon_tool(&sessions, AriseConfig::default());

        let out = tool
            .execute(
                serde_json::json!({"shadow": "tank", "prompt": "p", "run_in_background": true}),
                "parent",
            )
            .await
            .unwrap();
        assert_eq!(out, "[arise] Failed to summon tank: server unreachable");
    }

    #[tokio::test]
    async fn test_disabled_shadow_refused() {
        let sessions = Arc::new(MockSessions::default());
        let config = AriseConfig {
            disabled_shadows: vec!["tusk".to_string()],
            ..Default::default()
        };
        let (tool, _) = summon_tool(&sessions, config);

        let out = tool
            .execute(
                serde_json::json!({"shadow": "tusk", "prompt": "p", "run_in_background": false}),
                "parent",
            )
            .await
            .unwrap();
        assert_eq!(out, "[arise] Shadow tusk is disabled in configuration.");
        assert_eq!(sessions.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_unsummonable_shadows_refused() {
        let sessions = Arc::new(MockSessions::default());
        let (tool, _) = summon_tool(&sessions, AriseConfig::default());

        let out = tool
            .execute(
                serde_json::json!({"shadow": "gandalf", "prompt": "p", "run_in_background": false}),
                "parent",
            )
            .await
            .unwrap();
        assert_eq!(out, "[arise] Unknown shadow: gandalf");

        let out = tool
            .execute(
                serde_json::json!({"shadow": "monarch", "prompt": "p", "run_in_background": false}),
                "parent",
            )
            .await
            .unwrap();
        assert_eq!(out, "[arise] Unknown shadow: monarch");
    }
}

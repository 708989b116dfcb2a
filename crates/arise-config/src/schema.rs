use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// User-facing configuration, read from `opencode-arise.json`.
///
/// All keys are snake_case to match the file format the OpenCode plugin
/// ecosystem uses for its per-plugin config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AriseConfig {
    pub server: ServerConfig,
    /// Shadows the user has switched off entirely.
    pub disabled_shadows: Vec<String>,
    /// Per-shadow overrides, keyed by shadow name.
    pub agents: HashMap<String, AgentOverride>,
    pub show_banner: bool,
}

impl Default for AriseConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            disabled_shadows: Vec::new(),
            agents: HashMap::new(),
            show_banner: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the OpenCode server.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4096".into(),
        }
    }
}

/// Per-shadow override: swap the model, or disable the shadow outright.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentOverride {
    /// Replacement model in `provider/model` form.
    pub model: Option<String>,
    pub disabled: Option<bool>,
}

impl AriseConfig {
    /// A shadow counts as disabled when listed in `disabled_shadows` or
    /// when its agent override says `disabled: true`.
    pub fn shadow_disabled(&self, shadow: &str) -> bool {
        if self.disabled_shadows.iter().any(|s| s == shadow) {
            return true;
        }
        self.agents
            .get(shadow)
            .and_then(|o| o.disabled)
            .unwrap_or(false)
    }

    /// Configured model override for a shadow, if any. Empty strings are
    /// treated as absent.
    pub fn model_override(&self, shadow: &str) -> Option<&str> {
        self.agents
            .get(shadow)
            .and_then(|o| o.model.as_deref())
            .filter(|m| !m.is_empty())
    }
}

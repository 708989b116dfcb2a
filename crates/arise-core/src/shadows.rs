use std::fmt;

use serde::{Deserialize, Serialize};

/// The shadow army roster. Each shadow maps to an agent the server knows
/// by the same name; `Monarch` is the orchestrator persona and is never
/// summoned itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShadowKind {
    Monarch,
    Beru,
    Igris,
    Bellion,
    Tusk,
    Tank,
    ShadowSovereign,
}

impl ShadowKind {
    pub const ALL: [ShadowKind; 7] = [
        ShadowKind::Monarch,
        ShadowKind::Beru,
        ShadowKind::Igris,
        ShadowKind::Bellion,
        ShadowKind::Tusk,
        ShadowKind::Tank,
        ShadowKind::ShadowSovereign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShadowKind::Monarch => "monarch",
            ShadowKind::Beru => "beru",
            ShadowKind::Igris => "igris",
            ShadowKind::Bellion => "bellion",
            ShadowKind::Tusk => "tusk",
            ShadowKind::Tank => "tank",
            ShadowKind::ShadowSovereign => "shadow-sovereign",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "monarch" => Some(ShadowKind::Monarch),
            "beru" => Some(ShadowKind::Beru),
            "igris" => Some(ShadowKind::Igris),
            "bellion" => Some(ShadowKind::Bellion),
            "tusk" => Some(ShadowKind::Tusk),
            "tank" => Some(ShadowKind::Tank),
            "shadow-sovereign" => Some(ShadowKind::ShadowSovereign),
            _ => None,
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            ShadowKind::Monarch => "Shadow Monarch - Orchestrator (Sung Jinwoo)",
            ShadowKind::Beru => "Ant King - Fastest codebase scout",
            ShadowKind::Igris => "Loyal Knight - Precise implementation",
            ShadowKind::Bellion => "Grand Marshal - Strategy and planning",
            ShadowKind::Tusk => "Creative shadow - UI/UX specialist",
            ShadowKind::Tank => "Research shadow - External knowledge gatherer",
            ShadowKind::ShadowSovereign => "Full power mode - Deep reasoning and recovery",
        }
    }

    /// Default model in `provider/model` form, overridable per shadow in
    /// the user config.
    pub fn default_model(&self) -> &'static str {
        match self {
            ShadowKind::Monarch => "anthropic/claude-opus-4-5",
            ShadowKind::Beru => "anthropic/claude-haiku-4-5",
            ShadowKind::Igris => "zai-coding-plan/glm-4.7",
            ShadowKind::Bellion => "openai/gpt-5.2",
            ShadowKind::Tusk => "google/gemini-3-pro-preview",
            ShadowKind::Tank => "zai-coding-plan/glm-4.7",
            ShadowKind::ShadowSovereign => "openai/gpt-5.2",
        }
    }

    /// Step limit the agent definition ships with.
    pub fn max_steps(&self) -> u32 {
        match self {
            ShadowKind::Monarch => 16,
            ShadowKind::Beru => 12,
            ShadowKind::Igris => 20,
            ShadowKind::Bellion => 12,
            ShadowKind::Tusk => 18,
            ShadowKind::Tank => 18,
            ShadowKind::ShadowSovereign => 24,
        }
    }

    /// Shadows the background launcher accepts. Scouts and analysts only;
    /// shadows that edit files stay in the foreground where the user can
    /// watch them.
    pub fn background_capable(&self) -> bool {
        matches!(self, ShadowKind::Beru | ShadowKind::Tank | ShadowKind::Bellion)
    }

    /// Every shadow except the orchestrator can be summoned explicitly.
    pub fn summonable(&self) -> bool {
        !matches!(self, ShadowKind::Monarch)
    }
}

impl fmt::Display for ShadowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

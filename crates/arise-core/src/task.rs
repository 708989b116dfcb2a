use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shadows::ShadowKind;

/// Lifecycle of a background task. Transitions are monotonic: `Running`
/// moves to exactly one terminal state and stays there.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// A delegated shadow session tracked in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub session_id: String,
    /// Session the launch request came from, for scoped listing.
    pub parent_session_id: String,
    pub shadow: ShadowKind,
    pub description: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Whole seconds from start to completion, or to now while the task is
    /// still running. Rounded to the nearest second for display.
    pub fn duration_secs(&self) -> i64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        let millis = (end - self.started_at).num_milliseconds();
        (millis as f64 / 1000.0).round() as i64
    }
}

const SUFFIX_SPACE: u64 = 36 * 36 * 36 * 36;

// Per-process sequence folded into the id suffix so ids stay distinct even
// when two launches land on the same millisecond.
static TASK_SEQ: AtomicU64 = AtomicU64::new(0);

fn process_salt() -> u64 {
    static SALT: OnceLock<u64> = OnceLock::new();
    *SALT.get_or_init(|| uuid::Uuid::new_v4().as_u128() as u64)
}

/// Generate a task id of the form `arise_<millis base36>_<4 chars base36>`.
pub fn generate_task_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let seq = TASK_SEQ.fetch_add(1, Ordering::Relaxed);
    let suffix = process_salt().wrapping_add(seq) % SUFFIX_SPACE;
    format!("arise_{}_{:0>4}", to_base36(millis), to_base36(suffix))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    out.iter().rev().collect()
}

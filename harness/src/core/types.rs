//! Shared deterministic types for harness core logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Lifecycle state of a task.
///
/// Unknown strings are kept verbatim so a save never rewrites a status the
/// harness does not understand; such tasks are never eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(raw) => raw,
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Self::Pending,
            Value::String(raw) => Self::parse(&raw),
            other => Self::Other(other.to_string()),
        })
    }
}

/// How many workers may hold tasks at once (`session_config.concurrency_mode`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One worker at a time; any in-progress task belongs to "us".
    #[default]
    Exclusive,
    /// Several workers; in-progress tasks are attributed via `claimed_by`.
    Concurrent,
}

impl<'de> Deserialize<'de> for ConcurrencyMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) if raw == "concurrent" => Self::Concurrent,
            _ => Self::Exclusive,
        })
    }
}

/// Per-status task counts for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub other: usize,
}

impl StatusCounts {
    /// True when there is at least one task and every task is completed.
    pub fn all_completed(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }

    /// Render as `total=.. completed=.. pending=.. in_progress=.. failed=..`.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "total={} completed={} pending={} in_progress={} failed={}",
            self.total, self.completed, self.pending, self.in_progress, self.failed
        );
        if self.other > 0 {
            line.push_str(&format!(" other={}", self.other));
        }
        line
    }
}

//! The task document (`harness-tasks.json`) as an in-memory value.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::core::lenient;
use crate::core::task::Task;
use crate::core::types::ConcurrencyMode;

/// Whole task document: task list, session configuration, session counter.
///
/// Top-level keys the harness does not model are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    #[serde(default, deserialize_with = "task_list")]
    pub tasks: Vec<Task>,
    #[serde(default, deserialize_with = "session_config")]
    pub session_config: SessionConfig,
    #[serde(
        default,
        skip_serializing_if = "is_zero",
        deserialize_with = "lenient::u32_or_zero"
    )]
    pub session_count: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskDocument {
    /// Build a document from parsed JSON, degrading instead of failing.
    ///
    /// A non-object top level or a `tasks` field that is not a list yields an
    /// empty task list; non-object task entries are dropped.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }
}

/// Document-level `session_config`. Read-only to the hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_mode: Option<ConcurrencyMode>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_u32"
    )]
    pub max_sessions: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_u32"
    )]
    pub max_tasks_per_session: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionConfig {
    pub fn mode(&self) -> ConcurrencyMode {
        self.concurrency_mode.unwrap_or_default()
    }
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn task_list<'de, D>(deserializer: D) -> Result<Vec<Task>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn session_config<'de, D>(deserializer: D) -> Result<SessionConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(SessionConfig::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaskStatus;
    use serde_json::json;

    #[test]
    fn non_object_top_level_is_empty() {
        let doc = TaskDocument::from_value(json!([1, 2, 3]));
        assert!(doc.tasks.is_empty());
    }

    #[test]
    fn tasks_that_are_not_a_list_degrade_to_empty() {
        let doc = TaskDocument::from_value(json!({"tasks": "not a list", "version": 2}));
        assert!(doc.tasks.is_empty());
        assert_eq!(doc.extra.get("version"), Some(&json!(2)));
    }

    #[test]
    fn non_object_task_entries_are_dropped() {
        let doc = TaskDocument::from_value(json!({
            "tasks": ["junk", {"id": "t1", "status": "completed"}, 4],
        }));
        assert_eq!(doc.tasks.len(), 1);
        assert_eq!(doc.tasks[0].status, TaskStatus::Completed);
    }

    #[test]
    fn session_config_defaults_to_exclusive() {
        let doc = TaskDocument::from_value(json!({"tasks": [], "session_config": "weird"}));
        assert_eq!(doc.session_config.mode(), ConcurrencyMode::Exclusive);

        let doc = TaskDocument::from_value(json!({
            "session_config": {"concurrency_mode": "concurrent", "max_sessions": "4"},
        }));
        assert_eq!(doc.session_config.mode(), ConcurrencyMode::Concurrent);
        assert_eq!(doc.session_config.max_sessions, Some(4));
    }
}

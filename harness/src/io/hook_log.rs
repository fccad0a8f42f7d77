//! Opt-in JSONL debug log of hook invocations (`HARNESS_HOOK_LOG`).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::lease::format_timestamp;
use crate::io::payload::HookPayload;

/// Payload keys copied into each record when present.
const COPIED_KEYS: [&str; 9] = [
    "session_id",
    "cwd",
    "source",
    "reason",
    "teammate_name",
    "team_name",
    "agent_id",
    "agent_type",
    "stop_hook_active",
];

pub fn entry(hook: &str, root: &Path, payload: &HookPayload, now: DateTime<Utc>) -> Value {
    let mut record = Map::new();
    record.insert("ts".to_string(), Value::String(format_timestamp(now)));
    record.insert("hook".to_string(), Value::String(hook.to_string()));
    record.insert(
        "hook_event_name".to_string(),
        payload.get("hook_event_name").cloned().unwrap_or(Value::Null),
    );
    record.insert(
        "harness_root".to_string(),
        Value::String(root.display().to_string()),
    );
    for key in COPIED_KEYS {
        if let Some(value) = payload.get(key) {
            record.insert(key.to_string(), value.clone());
        }
    }
    Value::Object(record)
}

fn append(log_path: &Path, record: &Value) -> Result<()> {
    if let Some(parent) = log_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open {}", log_path.display()))?;
    writeln!(file, "{record}").with_context(|| format!("append {}", log_path.display()))
}

/// Append one record; failures are only traced.
pub fn record(log_path: Option<&Path>, hook: &str, root: &Path, payload: &HookPayload) {
    let Some(log_path) = log_path else {
        return;
    };
    let record = entry(hook, root, payload, Utc::now());
    if let Err(err) = append(log_path, &record) {
        debug!(path = %log_path.display(), error = %format!("{err:#}"), "hook log write failed");
    }
}

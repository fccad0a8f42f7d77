//! Scan a session transcript (JSONL) for the initiating user request.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::core::reflect::truncate_chars;

/// First user message in the first `max_bytes` of the transcript, trimmed and
/// truncated to `limit_chars`. Empty when nothing usable is found.
pub fn extract_original_prompt(path: &Path, max_bytes: u64, limit_chars: usize) -> String {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "transcript unavailable");
            return String::new();
        }
    };
    let reader = BufReader::new(file.take(max_bytes));
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if let Some(text) = user_text(&entry) {
            return truncate_chars(&text, limit_chars).trim().to_string();
        }
    }
    String::new()
}

/// Text of a user entry, in either the flat (`role`/`content`) or nested
/// (`type`/`message.content`) layout.
fn user_text(entry: &Value) -> Option<String> {
    let role = entry
        .get("role")
        .and_then(Value::as_str)
        .or_else(|| entry.get("type").and_then(Value::as_str))?;
    if role != "user" {
        return None;
    }
    let content = entry
        .get("content")
        .or_else(|| entry.get("message").and_then(|message| message.get("content")))?;
    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                Value::String(text) => Some(text.as_str()),
                Value::Object(_) => block.get("text").and_then(Value::as_str),
                _ => None,
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

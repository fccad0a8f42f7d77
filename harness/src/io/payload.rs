//! Hook input payload (JSON object on stdin).

use std::io::Read;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::debug;

/// Loosely typed hook payload. Anything unparsable is an empty object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookPayload {
    fields: Map<String, Value>,
}

impl HookPayload {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => Self { fields },
            Ok(_) => {
                debug!("hook payload is not an object");
                Self::default()
            }
            Err(err) => {
                debug!(error = %err, "hook payload is not JSON");
                Self::default()
            }
        }
    }

    /// Read and parse stdin; read errors also yield an empty payload.
    pub fn from_reader(mut reader: impl Read) -> Self {
        let mut raw = String::new();
        if let Err(err) = reader.read_to_string(&mut raw) {
            debug!(error = %err, "failed to read hook payload");
            return Self::default();
        }
        Self::parse(&raw)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Non-empty string field.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.str_field("session_id")
    }

    pub fn cwd(&self) -> Option<PathBuf> {
        self.str_field("cwd").map(PathBuf::from)
    }

    pub fn teammate_name(&self) -> Option<&str> {
        self.str_field("teammate_name")
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.str_field("agent_id")
    }

    pub fn transcript_path(&self) -> Option<PathBuf> {
        self.str_field("transcript_path").map(PathBuf::from)
    }

    /// The host's re-entrancy flag. Accepts booleans, numbers and the usual
    /// truthy strings.
    pub fn stop_hook_active(&self) -> bool {
        match self.fields.get("stop_hook_active") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(raw)) => matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            _ => false,
        }
    }
}

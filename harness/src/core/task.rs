//! Task entries of `harness-tasks.json`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::core::lenient;
use crate::core::types::TaskStatus;

/// Retry ceiling used when a task does not set `max_attempts`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Rank used for a missing or unrecognized priority; sorts after `P2`.
pub const UNKNOWN_PRIORITY_RANK: u8 = 9;

/// One unit of work.
///
/// Fields the harness does not model are kept in `extra` and written back
/// untouched on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub id: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub title: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub priority: Option<String>,
    #[serde(default)]
    pub depends_on: DependsOn,
    #[serde(default, deserialize_with = "lenient::u32_or_zero")]
    pub attempts: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_u32"
    )]
    pub max_attempts: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub claimed_by: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub claimed_at: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_string"
    )]
    pub lease_expires_at: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient::string_list"
    )]
    pub error_log: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Retry ceiling, defaulting to [`DEFAULT_MAX_ATTEMPTS`].
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    /// `P0` = 0, `P1` = 1, `P2` = 2, anything else sorts last.
    pub fn priority_rank(&self) -> u8 {
        match self.priority.as_deref() {
            Some("P0") => 0,
            Some("P1") => 1,
            Some("P2") => 2,
            _ => UNKNOWN_PRIORITY_RANK,
        }
    }

    /// Human label: the title when present, otherwise the id.
    pub fn label(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.id,
        }
    }

    pub fn is_claimed_by(&self, worker: &str) -> bool {
        self.claimed_by.as_deref() == Some(worker)
    }
}

/// `depends_on`: an ordered list of task ids.
///
/// A value that is present but not a list is kept verbatim and can never be
/// satisfied. `null` and a missing field mean "no dependencies".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependsOn {
    ids: Vec<String>,
    malformed: Option<Value>,
}

impl DependsOn {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            malformed: None,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed.is_some()
    }
}

impl Serialize for DependsOn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.malformed {
            Some(raw) => raw.serialize(serializer),
            None => self.ids.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DependsOn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Self::default(),
            Value::Array(items) => Self {
                ids: items.iter().filter_map(lenient::value_to_string).collect(),
                malformed: None,
            },
            other => Self {
                ids: Vec::new(),
                malformed: Some(other),
            },
        })
    }
}

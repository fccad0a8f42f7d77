//! Hook decisions and their wire format.
//!
//! Soft decisions travel as JSON on stdout with exit code 0. A hard refusal has
//! no stdout payload: it is a diagnostic on stderr plus [`exit_codes::REFUSE`].

use serde::Serialize;

use crate::exit_codes;

/// Decision of one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// No output at all; the host proceeds as it would without the hook.
    NoOpinion,
    /// `{"decision":"allow"}` with an optional reason.
    Allow { reason: Option<String> },
    /// `{"decision":"block","reason":...}`.
    Block { reason: String },
    /// `{"hookSpecificOutput":{"additionalContext":...}}`.
    Context { text: String },
    /// Exit status [`exit_codes::REFUSE`] with `message` on stderr.
    Refuse { message: String },
}

#[derive(Serialize)]
struct DecisionJson<'a> {
    decision: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextJson<'a> {
    hook_specific_output: AdditionalContext<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdditionalContext<'a> {
    additional_context: &'a str,
}

impl HookDecision {
    pub fn block(reason: impl Into<String>) -> Self {
        Self::Block {
            reason: reason.into(),
        }
    }

    /// JSON line for stdout, if this decision has one.
    pub fn stdout_json(&self) -> serde_json::Result<Option<String>> {
        let line = match self {
            Self::NoOpinion | Self::Refuse { .. } => return Ok(None),
            Self::Allow { reason } => serde_json::to_string(&DecisionJson {
                decision: "allow",
                reason: reason.as_deref().filter(|reason| !reason.is_empty()),
            })?,
            Self::Block { reason } => serde_json::to_string(&DecisionJson {
                decision: "block",
                reason: Some(reason.as_str()),
            })?,
            Self::Context { text } => serde_json::to_string(&ContextJson {
                hook_specific_output: AdditionalContext {
                    additional_context: text,
                },
            })?,
        };
        Ok(Some(line))
    }

    pub fn stderr_message(&self) -> Option<&str> {
        match self {
            Self::Refuse { message } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Refuse { .. } => exit_codes::REFUSE,
            _ => exit_codes::OK,
        }
    }
}

/// Decision plus an optional operator-facing warning (printed to stderr).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    pub decision: HookDecision,
    pub warning: Option<String>,
}

impl HookOutcome {
    pub fn new(decision: HookDecision) -> Self {
        Self {
            decision,
            warning: None,
        }
    }

    pub fn no_opinion() -> Self {
        Self::new(HookDecision::NoOpinion)
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

impl From<HookDecision> for HookOutcome {
    fn from(decision: HookDecision) -> Self {
        Self::new(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_serializes_reason() {
        let json = HookDecision::block("next: t1")
            .stdout_json()
            .expect("json")
            .expect("line");
        assert_eq!(json, r#"{"decision":"block","reason":"next: t1"}"#);
    }

    #[test]
    fn allow_omits_empty_reason() {
        let json = HookDecision::Allow {
            reason: Some(String::new()),
        }
        .stdout_json()
        .expect("json");
        assert_eq!(json.as_deref(), Some(r#"{"decision":"allow"}"#));
    }

    #[test]
    fn context_uses_host_field_names() {
        let json = HookDecision::Context {
            text: "HARNESS: total=0".to_string(),
        }
        .stdout_json()
        .expect("json")
        .expect("line");
        assert_eq!(
            json,
            r#"{"hookSpecificOutput":{"additionalContext":"HARNESS: total=0"}}"#
        );
    }

    #[test]
    fn refusal_is_exit_status_only() {
        let refuse = HookDecision::Refuse {
            message: "HARNESS: busy".to_string(),
        };
        assert_eq!(refuse.stdout_json().expect("json"), None);
        assert_eq!(refuse.stderr_message(), Some("HARNESS: busy"));
        assert_eq!(refuse.exit_code(), exit_codes::REFUSE);
        assert_eq!(HookDecision::NoOpinion.exit_code(), exit_codes::OK);
    }
}

//! SubagentStop hook: a worker may not stop while it holds in-progress work.
//! Pending work does not block a subagent.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::core::decision::{HookDecision, HookOutcome};
use crate::core::ownership::{Ownership, describe_tasks, in_progress_for_mode};
use crate::hook::HookContext;

pub fn run(ctx: &HookContext, now: DateTime<Utc>) -> HookOutcome {
    if ctx.payload.stop_hook_active() {
        return HookOutcome::no_opinion();
    }
    let document = match ctx.load_and_reap(now) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "task document unreadable; no opinion on subagent stop");
            return HookOutcome::no_opinion();
        }
    };

    let mode = document.session_config.mode();
    match in_progress_for_mode(&document.tasks, mode, ctx.worker_id()) {
        Ownership::Clear => HookOutcome::no_opinion(),
        Ownership::Held(tasks) => HookDecision::block(format!(
            "HARNESS: still in progress: {}. Complete or fail it before stopping.",
            describe_tasks(&tasks)
        ))
        .into(),
        Ownership::Unidentified(tasks) => HookDecision::block(format!(
            "HARNESS: tasks are in progress ({}) and this subagent has no worker identity; \
             set HARNESS_WORKER_ID so ownership can be checked.",
            describe_tasks(&tasks)
        ))
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{SessionConfig, TaskDocument};
    use crate::core::types::ConcurrencyMode;
    use crate::io::config::HarnessEnv;
    use crate::io::payload::HookPayload;
    use crate::test_support::{TaskBuilder, TestRoot, in_progress, pending};

    fn now() -> DateTime<Utc> {
        crate::core::lease::parse_timestamp("2026-01-01T00:00:00Z").expect("timestamp")
    }

    fn run_as(root: &TestRoot, payload: &str) -> HookOutcome {
        let ctx = HookContext::new(root.path(), HarnessEnv::default(), HookPayload::parse(payload));
        run(&ctx, now())
    }

    fn concurrent(root: &TestRoot, tasks: Vec<crate::core::task::Task>) {
        let document = TaskDocument {
            tasks,
            session_config: SessionConfig {
                concurrency_mode: Some(ConcurrencyMode::Concurrent),
                ..SessionConfig::default()
            },
            ..TaskDocument::default()
        };
        root.write_document(&document).expect("seed");
    }

    #[test]
    fn blocks_owner_with_titles() {
        let root = TestRoot::new().expect("root");
        concurrent(
            &root,
            vec![in_progress("t1", Some("w1")).with_title("Mine"), pending("t2")],
        );
        match run_as(&root, r#"{"agent_id":"w1"}"#).decision {
            HookDecision::Block { reason } => assert!(reason.contains("t1 (Mine)"), "{reason}"),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn other_worker_and_pending_work_do_not_block() {
        let root = TestRoot::new().expect("root");
        concurrent(&root, vec![in_progress("t1", Some("w1")), pending("t2")]);
        assert_eq!(
            run_as(&root, r#"{"agent_id":"w2"}"#).decision,
            HookDecision::NoOpinion
        );
    }

    #[test]
    fn missing_identity_blocks_when_others_hold_tasks() {
        let root = TestRoot::new().expect("root");
        concurrent(&root, vec![in_progress("t1", Some("w1"))]);
        match run_as(&root, "{}").decision {
            HookDecision::Block { reason } => assert!(reason.contains("worker identity")),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn reentrant_invocation_is_allowed() {
        let root = TestRoot::new().expect("root");
        concurrent(&root, vec![in_progress("t1", Some("w1"))]);
        assert_eq!(
            run_as(&root, r#"{"agent_id":"w1","stop_hook_active":true}"#).decision,
            HookDecision::NoOpinion
        );
    }
}

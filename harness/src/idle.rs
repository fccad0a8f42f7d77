//! TeammateIdle hook: refuse to let a worker go idle while it owns work or
//! eligible work is waiting.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::core::decision::{HookDecision, HookOutcome};
use crate::core::eligibility::eligible_tasks;
use crate::core::ownership::{Ownership, describe_tasks, in_progress_for};
use crate::hook::HookContext;

pub fn run(ctx: &HookContext, now: DateTime<Utc>) -> HookOutcome {
    let document = match ctx.load_and_reap(now) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "task document unreadable; no opinion on idle");
            return HookOutcome::no_opinion();
        }
    };

    let worker = ctx.worker_id();
    let message = match in_progress_for(&document.tasks, worker) {
        Ownership::Held(tasks) => format!(
            "HARNESS: {} still owns {}. Complete or fail it before going idle.",
            worker.unwrap_or("this worker"),
            describe_tasks(&tasks)
        ),
        Ownership::Unidentified(tasks) => format!(
            "HARNESS: tasks are in progress ({}) and this worker has no identity; \
             set HARNESS_WORKER_ID so ownership can be checked.",
            describe_tasks(&tasks)
        ),
        Ownership::Clear => match eligible_tasks(&document.tasks).next_task() {
            Some(next) => format!(
                "HARNESS: eligible work remains: next={} ({}). Claim it before going idle.",
                next.id,
                next.label()
            ),
            None => return HookOutcome::no_opinion(),
        },
    };
    HookDecision::Refuse { message }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes;
    use crate::io::config::HarnessEnv;
    use crate::io::payload::HookPayload;
    use crate::test_support::{TestRoot, completed, failed, in_progress, pending};

    fn now() -> DateTime<Utc> {
        crate::core::lease::parse_timestamp("2026-01-01T00:00:00Z").expect("timestamp")
    }

    fn run_as(root: &TestRoot, payload: &str) -> HookOutcome {
        let ctx = HookContext::new(root.path(), HarnessEnv::default(), HookPayload::parse(payload));
        run(&ctx, now())
    }

    #[test]
    fn owner_is_refused() {
        let root = TestRoot::new().expect("root");
        root.write_tasks(vec![in_progress("t1", Some("w1"))])
            .expect("seed");
        let outcome = run_as(&root, r#"{"teammate_name":"w1"}"#);
        assert_eq!(outcome.decision.exit_code(), exit_codes::REFUSE);
        let message = outcome.decision.stderr_message().expect("message");
        assert!(message.starts_with("HARNESS:"));
        assert!(message.contains("t1"));
    }

    #[test]
    fn other_workers_tasks_do_not_hold_an_identified_worker() {
        let root = TestRoot::new().expect("root");
        root.write_tasks(vec![in_progress("t1", Some("w1")), completed("t0")])
            .expect("seed");
        let outcome = run_as(&root, r#"{"teammate_name":"w2"}"#);
        assert_eq!(outcome.decision, HookDecision::NoOpinion);
    }

    #[test]
    fn missing_identity_is_refused_when_work_is_held() {
        let root = TestRoot::new().expect("root");
        root.write_tasks(vec![in_progress("t1", Some("w1"))])
            .expect("seed");
        let outcome = run_as(&root, "{}");
        let message = outcome.decision.stderr_message().expect("message");
        assert!(message.contains("identity"));
    }

    #[test]
    fn eligible_work_is_refused_and_exhausted_work_is_not() {
        let root = TestRoot::new().expect("root");
        root.write_tasks(vec![pending("t2")]).expect("seed");
        let outcome = run_as(&root, r#"{"teammate_name":"w2"}"#);
        assert!(
            outcome
                .decision
                .stderr_message()
                .expect("message")
                .contains("next=t2")
        );

        root.write_tasks(vec![failed("t1", 3, 3)]).expect("seed");
        let outcome = run_as(&root, r#"{"teammate_name":"w2"}"#);
        assert_eq!(outcome.decision, HookDecision::NoOpinion);
    }
}

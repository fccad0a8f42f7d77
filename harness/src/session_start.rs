//! SessionStart hook: inject a status line into the new session's context.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::core::decision::{HookDecision, HookOutcome};
use crate::core::eligibility::{eligible_tasks, status_counts};
use crate::core::ownership::{Ownership, describe_tasks, in_progress_for};
use crate::hook::HookContext;
use crate::io::paths::TASKS_FILE;
use crate::io::progress;

pub fn run(ctx: &HookContext, now: DateTime<Utc>) -> HookOutcome {
    let document = match ctx.load_and_reap(now) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "task document unreadable at session start");
            return HookDecision::Context {
                text: format!("HARNESS: error reading {TASKS_FILE}: {err}"),
            }
            .into();
        }
    };

    let counts = status_counts(&document.tasks);
    let mut line = format!(
        "HARNESS: session={} {}",
        document.session_count,
        counts.summary()
    );
    if let Some(next) = eligible_tasks(&document.tasks).next_task() {
        line.push_str(&format!(" next={} ({})", next.id, next.label()));
    }
    if let Some(worker) = ctx.worker_id() {
        if let Ownership::Held(tasks) = in_progress_for(&document.tasks, Some(worker)) {
            line.push_str(&format!(" yours={}", describe_tasks(&tasks)));
        }
    }
    if let Some(last) = progress::last_line(&ctx.paths.progress_path) {
        line.push_str(&format!("\nlast progress: {last}"));
    }
    HookDecision::Context { text: line }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::HarnessEnv;
    use crate::io::payload::HookPayload;
    use crate::test_support::{TaskBuilder, TestRoot, completed, in_progress, pending};

    fn now() -> DateTime<Utc> {
        crate::core::lease::parse_timestamp("2026-01-01T00:00:00Z").expect("timestamp")
    }

    fn context_text(outcome: HookOutcome) -> String {
        match outcome.decision {
            HookDecision::Context { text } => text,
            other => panic!("expected context, got {other:?}"),
        }
    }

    #[test]
    fn summarizes_counts_next_task_and_progress() {
        let root = TestRoot::new().expect("root");
        root.write_tasks(vec![
            completed("t1"),
            pending("t2").with_title("Write docs"),
            in_progress("t3", Some("w1")),
        ])
        .expect("seed");
        root.write_progress("[SESSION-1] START\n[SESSION-1] Completed [t1]\n")
            .expect("progress");
        let ctx = HookContext::new(
            root.path(),
            HarnessEnv::default(),
            HookPayload::parse(r#"{"teammate_name":"w1"}"#),
        );

        let text = context_text(run(&ctx, now()));
        assert!(text.contains("total=3 completed=1 pending=1 in_progress=1 failed=0"), "{text}");
        assert!(text.contains("next=t2 (Write docs)"), "{text}");
        assert!(text.contains("yours=t3"), "{text}");
        assert!(text.ends_with("last progress: [SESSION-1] Completed [t1]"), "{text}");
    }

    #[test]
    fn corrupt_document_reports_error() {
        let root = TestRoot::new().expect("root");
        root.write_raw("][").expect("seed");
        let ctx = HookContext::new(root.path(), HarnessEnv::default(), HookPayload::default());
        assert!(context_text(run(&ctx, now())).contains("error"));
    }
}

//! Stop hook: keep the lead session working while orchestrated work remains.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::core::decision::{HookDecision, HookOutcome};
use crate::core::document::TaskDocument;
use crate::core::eligibility::{eligible_tasks, status_counts};
use crate::core::ownership::{Ownership, describe_tasks, in_progress_for_mode};
use crate::core::types::StatusCounts;
use crate::core::valve::{StopCounter, ValveVerdict, evaluate};
use crate::hook::HookContext;
use crate::io::counters::{read_stop_counter, remove_if_exists, touch, write_stop_counter};
use crate::io::paths::TASKS_FILE;
use crate::io::progress;
use crate::io::store::StoreError;

pub fn run(ctx: &HookContext, now: DateTime<Utc>) -> HookOutcome {
    let reentrant = ctx.payload.stop_hook_active();
    let document = match ctx.load_and_reap(now) {
        Ok(document) => document,
        Err(err) => return unreadable(&err, reentrant),
    };
    let counts = status_counts(&document.tasks);

    if let Some(reason) = session_limit_reached(ctx, &document) {
        info!(%reason, "session limit reached; allowing stop");
        return HookDecision::Allow {
            reason: Some(reason),
        }
        .into();
    }

    if counts.all_completed() {
        drain(ctx);
        return HookOutcome::no_opinion();
    }

    let Some(reason) = blocking_reason(ctx, &document, &counts) else {
        // Only stuck work is left; blocking would never end.
        clear_counter(ctx);
        return HookOutcome::no_opinion();
    };

    let counter = read_stop_counter(&ctx.paths.stop_counter_path);
    let completed = u32::try_from(counts.completed).unwrap_or(u32::MAX);
    match evaluate(
        counter,
        completed,
        ctx.config.max_consecutive_blocks,
        reentrant,
    ) {
        ValveVerdict::Block(next) => {
            persist_counter(ctx, next);
            HookDecision::block(reason).into()
        }
        ValveVerdict::Release(next) => {
            persist_counter(ctx, next);
            let warning = format!(
                "HARNESS: safety valve released Stop after {} consecutive blocks without progress; \
                 blocking logic bypassed. Pending: {reason}",
                next.consecutive_blocks
            );
            warn!(blocks = next.consecutive_blocks, "safety valve released");
            HookOutcome::new(HookDecision::Allow {
                reason: Some("HARNESS: safety valve released (no progress)".to_string()),
            })
            .with_warning(warning)
        }
    }
}

fn unreadable(err: &StoreError, reentrant: bool) -> HookOutcome {
    if reentrant {
        warn!(error = %err, "task document unreadable during re-entrant stop; allowing");
        return HookOutcome::new(HookDecision::Allow {
            reason: Some(format!("HARNESS: {TASKS_FILE} unreadable; allowing stop")),
        })
        .with_warning(format!(
            "HARNESS: {err}; stop allowed without checking remaining work"
        ));
    }
    HookDecision::block(format!(
        "HARNESS: {err}. Repair {TASKS_FILE} (the previous version is in {TASKS_FILE}.bak) \
         or remove .harness-active to end orchestration."
    ))
    .into()
}

fn session_limit_reached(ctx: &HookContext, document: &TaskDocument) -> Option<String> {
    let config = &document.session_config;
    if let Some(max) = config.max_sessions.filter(|max| *max > 0) {
        if document.session_count >= max {
            return Some(format!(
                "HARNESS: session limit reached (session_count={} max_sessions={max})",
                document.session_count
            ));
        }
    }
    if let Some(max) = config.max_tasks_per_session.filter(|max| *max > 0) {
        let done = progress::completed_in_session(&ctx.paths.progress_path, document.session_count);
        if done >= max as usize {
            return Some(format!(
                "HARNESS: per-session task limit reached (completed={done} max_tasks_per_session={max})"
            ));
        }
    }
    None
}

/// Everything is completed: deactivate and request one reflection pass.
fn drain(ctx: &HookContext) {
    info!(root = %ctx.paths.root.display(), "all tasks completed; deactivating");
    if let Err(err) = remove_if_exists(&ctx.paths.active_marker) {
        warn!(error = %format!("{err:#}"), "failed to remove active marker");
    }
    if let Err(err) = touch(&ctx.paths.reflect_marker) {
        warn!(error = %format!("{err:#}"), "failed to create reflect marker");
    }
    clear_counter(ctx);
}

fn blocking_reason(
    ctx: &HookContext,
    document: &TaskDocument,
    counts: &StatusCounts,
) -> Option<String> {
    let mode = document.session_config.mode();
    match in_progress_for_mode(&document.tasks, mode, ctx.worker_id()) {
        Ownership::Held(tasks) => {
            return Some(format!(
                "HARNESS: in progress: {}. Finish and record the outcome before stopping. ({})",
                describe_tasks(&tasks),
                counts.summary()
            ));
        }
        Ownership::Unidentified(tasks) => {
            return Some(format!(
                "HARNESS: tasks are in progress ({}) and this session has no worker identity; \
                 set HARNESS_WORKER_ID so ownership can be checked. ({})",
                describe_tasks(&tasks),
                counts.summary()
            ));
        }
        Ownership::Clear => {}
    }

    let eligible = eligible_tasks(&document.tasks);
    let next = eligible.next_task()?;
    Some(format!(
        "HARNESS: work remains. next={} ({}) priority={} attempts={}/{}. ({})",
        next.id,
        next.label(),
        next.priority.as_deref().unwrap_or("-"),
        next.attempts,
        next.max_attempts(),
        counts.summary()
    ))
}

fn persist_counter(ctx: &HookContext, counter: StopCounter) {
    if let Err(err) = write_stop_counter(&ctx.paths.stop_counter_path, counter) {
        warn!(error = %format!("{err:#}"), "failed to write stop counter");
    }
}

fn clear_counter(ctx: &HookContext) {
    if let Err(err) = remove_if_exists(&ctx.paths.stop_counter_path) {
        warn!(error = %format!("{err:#}"), "failed to clear stop counter");
    }
}

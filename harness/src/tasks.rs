//! Operator commands that mutate tasks: claim, complete, fail, reap.
//!
//! Every mutation re-reads the document under the state lock and re-checks
//! status before committing, so a stale read elsewhere cannot double-claim.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::core::document::TaskDocument;
use crate::core::eligibility::eligible_tasks;
use crate::core::lease::{claim as claim_lease, reap_expired, record_completion, record_failure};
use crate::core::task::Task;
use crate::core::types::TaskStatus;
use crate::io::config::HarnessConfig;
use crate::io::paths::HarnessPaths;
use crate::io::progress::{self, session_line};
use crate::io::store::{Update, update_document};

/// Which task `claim` should take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimTarget {
    /// Head of the eligibility order.
    Next,
    /// A specific task, which must currently be eligible.
    Task(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(Task),
    NoEligibleTask,
    LockBusy,
}

/// Claim a task for `worker`. `ttl = None` records no lease expiry.
pub fn claim(
    paths: &HarnessPaths,
    config: &HarnessConfig,
    worker: &str,
    target: &ClaimTarget,
    ttl: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<ClaimOutcome> {
    let worker = worker.trim();
    if worker.is_empty() {
        bail!("worker id must not be empty");
    }

    let update = update_document(paths, config.lock_timeout(), |document| {
        let reaped = reap_expired(&mut document.tasks, now);
        if !reaped.is_empty() {
            info!(tasks = ?reaped, "reaped expired leases before claim");
        }
        let Some(id) = select(document, target)? else {
            return Ok(None);
        };
        let task = document
            .task_mut(&id)
            .with_context(|| format!("task {id} vanished"))?;
        claim_lease(task, worker, ttl, now);
        Ok(Some(task.clone()))
    })?;

    Ok(match update {
        Update::Applied(Some(task)) => {
            info!(task = %task.id, worker, "claimed");
            ClaimOutcome::Claimed(task)
        }
        Update::Applied(None) => ClaimOutcome::NoEligibleTask,
        Update::LockBusy => ClaimOutcome::LockBusy,
    })
}

fn select(document: &TaskDocument, target: &ClaimTarget) -> Result<Option<String>> {
    let eligible = eligible_tasks(&document.tasks);
    match target {
        ClaimTarget::Next => Ok(eligible.next_task().map(|task| task.id.clone())),
        ClaimTarget::Task(id) => {
            if document.task(id).is_none() {
                bail!("unknown task {id}");
            }
            let ready = eligible
                .pending_ready
                .iter()
                .chain(&eligible.retry_ready)
                .any(|task| task.id == *id);
            Ok(ready.then(|| id.clone()))
        }
    }
}

/// External success signal.
///
/// With `worker` set, the task must still be in progress under that worker;
/// otherwise the lease was lost and the signal is rejected.
pub fn complete(
    paths: &HarnessPaths,
    config: &HarnessConfig,
    id: &str,
    worker: Option<&str>,
) -> Result<Update<Task>> {
    let update = update_document(paths, config.lock_timeout(), |document| {
        let session = document.session_count;
        let task = document
            .task_mut(id)
            .with_context(|| format!("unknown task {id}"))?;
        ensure_owner(task, worker)?;
        let newly_completed = task.status != TaskStatus::Completed;
        record_completion(task);
        Ok((task.clone(), newly_completed, session))
    })?;

    let Update::Applied((task, newly_completed, session)) = update else {
        return Ok(Update::LockBusy);
    };
    if newly_completed {
        log_progress(paths, session, &format!("Completed [{}]", task.id));
    }
    info!(task = %task.id, "completed");
    Ok(Update::Applied(task))
}

/// External failure signal: `failed`, one more attempt, message logged.
pub fn fail(
    paths: &HarnessPaths,
    config: &HarnessConfig,
    id: &str,
    error: &str,
    worker: Option<&str>,
) -> Result<Update<Task>> {
    let update = update_document(paths, config.lock_timeout(), |document| {
        let session = document.session_count;
        let task = document
            .task_mut(id)
            .with_context(|| format!("unknown task {id}"))?;
        ensure_owner(task, worker)?;
        if task.status == TaskStatus::Completed {
            bail!("task {id} is already completed");
        }
        record_failure(task, error);
        Ok((task.clone(), session))
    })?;

    let Update::Applied((task, session)) = update else {
        return Ok(Update::LockBusy);
    };
    log_progress(
        paths,
        session,
        &format!("Failed [{}] attempt {}/{}", task.id, task.attempts, task.max_attempts()),
    );
    info!(task = %task.id, attempts = task.attempts, "failed");
    Ok(Update::Applied(task))
}

/// Reap every expired lease; returns the reaped ids.
pub fn reap(
    paths: &HarnessPaths,
    config: &HarnessConfig,
    now: DateTime<Utc>,
) -> Result<Update<Vec<String>>> {
    update_document(paths, config.lock_timeout(), |document| {
        Ok(reap_expired(&mut document.tasks, now))
    })
}

fn ensure_owner(task: &Task, worker: Option<&str>) -> Result<()> {
    let Some(worker) = worker else {
        return Ok(());
    };
    if task.status == TaskStatus::InProgress && task.is_claimed_by(worker) {
        return Ok(());
    }
    bail!(
        "ownership lost: task {} is {} (claimed_by={}), not held by {worker}",
        task.id,
        task.status.as_str(),
        task.claimed_by.as_deref().unwrap_or("nobody")
    )
}

fn log_progress(paths: &HarnessPaths, session: u32, event: &str) {
    if let Err(err) = progress::append(&paths.progress_path, &session_line(session, event)) {
        warn!(error = %format!("{err:#}"), "failed to append progress log");
    }
}

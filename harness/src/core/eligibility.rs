//! Deterministic eligibility and ordering over the task list.

use std::collections::HashSet;

use crate::core::task::Task;
use crate::core::types::{StatusCounts, TaskStatus};

/// Tasks that may run now, each list sorted by `(priority rank, id)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Eligible<'a> {
    /// `pending` tasks whose dependencies are all completed.
    pub pending_ready: Vec<&'a Task>,
    /// `failed` tasks with retry budget left and dependencies completed.
    pub retry_ready: Vec<&'a Task>,
}

impl<'a> Eligible<'a> {
    pub fn next_task(&self) -> Option<&'a Task> {
        next_task(&self.pending_ready, &self.retry_ready)
    }

    pub fn is_empty(&self) -> bool {
        self.pending_ready.is_empty() && self.retry_ready.is_empty()
    }
}

/// Ids of every task whose status is `completed`.
pub fn completed_ids(tasks: &[Task]) -> HashSet<&str> {
    tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Completed)
        .map(|task| task.id.as_str())
        .collect()
}

/// True when every dependency of `task` is in `done`.
///
/// A malformed `depends_on`, or a dependency on an id that does not exist, is
/// never satisfied.
pub fn deps_completed(task: &Task, done: &HashSet<&str>) -> bool {
    if task.depends_on.is_malformed() {
        return false;
    }
    task.depends_on
        .ids()
        .iter()
        .all(|dep| done.contains(dep.as_str()))
}

/// Compute pending-ready and retry-ready tasks.
///
/// Cycles are not detected: every task on a cycle simply never becomes eligible.
pub fn eligible_tasks(tasks: &[Task]) -> Eligible<'_> {
    let done = completed_ids(tasks);

    let mut pending_ready: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Pending && deps_completed(task, &done))
        .collect();
    let mut retry_ready: Vec<&Task> = tasks
        .iter()
        .filter(|task| {
            task.status == TaskStatus::Failed
                && task.attempts < task.max_attempts()
                && deps_completed(task, &done)
        })
        .collect();

    pending_ready.sort_by(|a, b| order_key(a).cmp(&order_key(b)));
    retry_ready.sort_by(|a, b| order_key(a).cmp(&order_key(b)));

    Eligible {
        pending_ready,
        retry_ready,
    }
}

/// Head of `pending_ready`, falling back to the head of `retry_ready`.
pub fn next_task<'a>(pending_ready: &[&'a Task], retry_ready: &[&'a Task]) -> Option<&'a Task> {
    pending_ready
        .first()
        .or_else(|| retry_ready.first())
        .copied()
}

pub fn status_counts(tasks: &[Task]) -> StatusCounts {
    let mut counts = StatusCounts {
        total: tasks.len(),
        ..StatusCounts::default()
    };
    for task in tasks {
        match task.status {
            TaskStatus::Pending => counts.pending += 1,
            TaskStatus::InProgress => counts.in_progress += 1,
            TaskStatus::Completed => counts.completed += 1,
            TaskStatus::Failed => counts.failed += 1,
            TaskStatus::Other(_) => counts.other += 1,
        }
    }
    counts
}

fn order_key(task: &Task) -> (u8, &str) {
    (task.priority_rank(), task.id.as_str())
}

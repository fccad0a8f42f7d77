//! Which in-progress tasks should keep a given worker from stopping or idling.

use crate::core::task::Task;
use crate::core::types::{ConcurrencyMode, TaskStatus};

/// In-progress work as seen by one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Ownership<'a> {
    /// Nothing in progress that concerns this worker.
    Clear,
    /// In-progress tasks this worker has to finish first.
    Held(Vec<&'a Task>),
    /// Tasks are in progress but the invocation carries no worker identity, so
    /// it cannot tell its own work from someone else's.
    Unidentified(Vec<&'a Task>),
}

impl Ownership<'_> {
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }
}

fn in_progress(tasks: &[Task]) -> impl Iterator<Item = &Task> {
    tasks
        .iter()
        .filter(|task| task.status == TaskStatus::InProgress)
}

/// Every in-progress task counts, whoever holds it.
pub fn in_progress_any(tasks: &[Task]) -> Ownership<'_> {
    let held: Vec<&Task> = in_progress(tasks).collect();
    if held.is_empty() {
        Ownership::Clear
    } else {
        Ownership::Held(held)
    }
}

/// Only tasks claimed by `worker` count; without an identity any in-progress
/// task is ambiguous.
pub fn in_progress_for<'a>(tasks: &'a [Task], worker: Option<&str>) -> Ownership<'a> {
    let Some(worker) = worker else {
        let all: Vec<&Task> = in_progress(tasks).collect();
        return if all.is_empty() {
            Ownership::Clear
        } else {
            Ownership::Unidentified(all)
        };
    };
    let held: Vec<&Task> = in_progress(tasks)
        .filter(|task| task.is_claimed_by(worker))
        .collect();
    if held.is_empty() {
        Ownership::Clear
    } else {
        Ownership::Held(held)
    }
}

/// `in_progress_any` in exclusive mode, `in_progress_for` in concurrent mode.
pub fn in_progress_for_mode<'a>(
    tasks: &'a [Task],
    mode: ConcurrencyMode,
    worker: Option<&str>,
) -> Ownership<'a> {
    match mode {
        ConcurrencyMode::Exclusive => in_progress_any(tasks),
        ConcurrencyMode::Concurrent => in_progress_for(tasks, worker),
    }
}

/// `t1 (Title), t2 (Other)` for messages.
pub fn describe_tasks(tasks: &[&Task]) -> String {
    tasks
        .iter()
        .map(|task| {
            if task.label() == task.id {
                task.id.clone()
            } else {
                format!("{} ({})", task.id, task.label())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

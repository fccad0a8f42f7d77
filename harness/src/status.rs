//! `harness status`: read-only JSON summary of the task document.

use anyhow::Result;
use serde::Serialize;

use crate::core::document::TaskDocument;
use crate::core::eligibility::{eligible_tasks, status_counts};
use crate::core::task::Task;
use crate::core::types::{ConcurrencyMode, StatusCounts, TaskStatus};
use crate::io::paths::HarnessPaths;
use crate::io::store::load_document;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub root: String,
    pub active: bool,
    pub reflect_pending: bool,
    pub session_count: u32,
    pub concurrency_mode: ConcurrencyMode,
    pub counts: StatusCounts,
    pub pending_ready: Vec<String>,
    pub retry_ready: Vec<String>,
    pub next: Option<String>,
    pub in_progress: Vec<InProgressEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InProgressEntry {
    pub id: String,
    pub claimed_by: Option<String>,
    pub lease_expires_at: Option<String>,
}

pub fn build_report(paths: &HarnessPaths, document: &TaskDocument) -> StatusReport {
    let eligible = eligible_tasks(&document.tasks);
    StatusReport {
        root: paths.root.display().to_string(),
        active: paths.is_active(),
        reflect_pending: paths.reflect_pending(),
        session_count: document.session_count,
        concurrency_mode: document.session_config.mode(),
        counts: status_counts(&document.tasks),
        pending_ready: ids(&eligible.pending_ready),
        retry_ready: ids(&eligible.retry_ready),
        next: eligible.next_task().map(|task| task.id.clone()),
        in_progress: document
            .tasks
            .iter()
            .filter(|task| task.status == TaskStatus::InProgress)
            .map(|task| InProgressEntry {
                id: task.id.clone(),
                claimed_by: task.claimed_by.clone(),
                lease_expires_at: task.lease_expires_at.clone(),
            })
            .collect(),
    }
}

fn ids(tasks: &[&Task]) -> Vec<String> {
    tasks.iter().map(|task| task.id.clone()).collect()
}

pub fn status(paths: &HarnessPaths) -> Result<StatusReport> {
    let document = load_document(paths)?;
    Ok(build_report(paths, &document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TaskBuilder, TestRoot, failed, in_progress, pending};

    #[test]
    fn reports_eligibility_lists() {
        let root = TestRoot::new().expect("root");
        root.write_tasks(vec![
            failed("t1", 1, 3),
            pending("t2").with_deps(&["t1"]),
            pending("t3").with_priority("P0"),
            in_progress("t4", Some("w1")),
        ])
        .expect("seed");

        let report = status(root.paths()).expect("status");
        assert_eq!(report.pending_ready, vec!["t3"]);
        assert_eq!(report.retry_ready, vec!["t1"]);
        assert_eq!(report.next.as_deref(), Some("t3"));
        assert_eq!(report.counts.total, 4);
        assert_eq!(report.in_progress[0].claimed_by.as_deref(), Some("w1"));
        assert!(!report.active);

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["concurrency_mode"], "exclusive");
        assert_eq!(json["counts"]["failed"], 1);
    }
}

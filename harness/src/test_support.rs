//! Test-only helpers for building tasks and state-root fixtures.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::document::TaskDocument;
use crate::core::task::{DependsOn, Task};
use crate::core::types::TaskStatus;
use crate::io::paths::HarnessPaths;

/// A `pending` task with default fields.
pub fn pending(id: &str) -> Task {
    Task::new(id)
}

pub fn completed(id: &str) -> Task {
    with_status(id, TaskStatus::Completed)
}

/// A `failed` task with explicit retry state.
pub fn failed(id: &str, attempts: u32, max_attempts: u32) -> Task {
    let mut task = with_status(id, TaskStatus::Failed);
    task.attempts = attempts;
    task.max_attempts = Some(max_attempts);
    task
}

/// An `in_progress` task, optionally claimed by `worker` (no expiry tracked).
pub fn in_progress(id: &str, worker: Option<&str>) -> Task {
    let mut task = with_status(id, TaskStatus::InProgress);
    task.claimed_by = worker.map(str::to_string);
    task
}

fn with_status(id: &str, status: TaskStatus) -> Task {
    Task {
        status,
        ..Task::new(id)
    }
}

/// Chainable setters for test tasks.
pub trait TaskBuilder: Sized {
    fn with_deps(self, ids: &[&str]) -> Self;
    fn with_priority(self, priority: &str) -> Self;
    fn with_title(self, title: &str) -> Self;
    fn with_lease(self, expires_at: &str) -> Self;
}

impl TaskBuilder for Task {
    fn with_deps(mut self, ids: &[&str]) -> Self {
        self.depends_on = DependsOn::new(ids.iter().copied());
        self
    }

    fn with_priority(mut self, priority: &str) -> Self {
        self.priority = Some(priority.to_string());
        self
    }

    fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    fn with_lease(mut self, expires_at: &str) -> Self {
        self.lease_expires_at = Some(expires_at.to_string());
        self
    }
}

/// Temporary state root with helpers for seeding the document and markers.
pub struct TestRoot {
    temp: TempDir,
    paths: HarnessPaths,
}

impl TestRoot {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let root = temp
            .path()
            .canonicalize()
            .context("canonicalize tempdir")?;
        let paths = HarnessPaths::new(&root);
        Ok(Self { temp, paths })
    }

    pub fn path(&self) -> &Path {
        &self.paths.root
    }

    pub fn paths(&self) -> &HarnessPaths {
        &self.paths
    }

    /// Underlying temporary directory.
    pub fn temp_dir(&self) -> &TempDir {
        &self.temp
    }

    pub fn write_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        let document = TaskDocument {
            tasks,
            ..TaskDocument::default()
        };
        self.write_document(&document)
    }

    pub fn write_document(&self, document: &TaskDocument) -> Result<()> {
        let raw = serde_json::to_string_pretty(document).context("serialize document")?;
        self.write_raw(&raw)
    }

    pub fn write_json(&self, value: &Value) -> Result<()> {
        let raw = serde_json::to_string_pretty(value).context("serialize json")?;
        self.write_raw(&raw)
    }

    pub fn write_raw(&self, raw: &str) -> Result<()> {
        fs::write(&self.paths.tasks_path, raw)
            .with_context(|| format!("write {}", self.paths.tasks_path.display()))
    }

    pub fn read_document(&self) -> Result<TaskDocument> {
        let raw = fs::read_to_string(&self.paths.tasks_path)
            .with_context(|| format!("read {}", self.paths.tasks_path.display()))?;
        let value: Value = serde_json::from_str(&raw).context("parse document")?;
        Ok(TaskDocument::from_value(value))
    }

    pub fn read_json(&self) -> Result<Value> {
        let raw = fs::read_to_string(&self.paths.tasks_path)
            .with_context(|| format!("read {}", self.paths.tasks_path.display()))?;
        serde_json::from_str(&raw).context("parse document")
    }

    pub fn activate(&self) -> Result<()> {
        touch(&self.paths.active_marker)
    }

    pub fn request_reflection(&self) -> Result<()> {
        touch(&self.paths.reflect_marker)
    }

    pub fn write_stop_counter(&self, raw: &str) -> Result<()> {
        fs::write(&self.paths.stop_counter_path, raw)
            .with_context(|| format!("write {}", self.paths.stop_counter_path.display()))
    }

    pub fn read_stop_counter(&self) -> Option<String> {
        fs::read_to_string(&self.paths.stop_counter_path).ok()
    }

    pub fn write_progress(&self, raw: &str) -> Result<()> {
        fs::write(&self.paths.progress_path, raw)
            .with_context(|| format!("write {}", self.paths.progress_path.display()))
    }

    pub fn write_config(&self, raw: &str) -> Result<()> {
        fs::write(&self.paths.config_path, raw)
            .with_context(|| format!("write {}", self.paths.config_path.display()))
    }
}

fn touch(path: &Path) -> Result<()> {
    fs::write(path, "").with_context(|| format!("create {}", path.display()))
}

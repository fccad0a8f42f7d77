//! Durable task document store.
//!
//! `save` writes `harness-tasks.json.tmp`, copies the current document to
//! `harness-tasks.json.bak`, then renames the temp file over the original. The
//! rename is the only step that has to be atomic.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::document::TaskDocument;
use crate::io::lock::{DirLock, LockError};
use crate::io::paths::HarnessPaths;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Parse a document; shape problems degrade, only invalid JSON is `Corrupt`.
pub fn parse_document(path: &Path, raw: &str) -> Result<TaskDocument, StoreError> {
    let value: Value = serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(TaskDocument::from_value(value))
}

pub fn load_document(paths: &HarnessPaths) -> Result<TaskDocument, StoreError> {
    let path = &paths.tasks_path;
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.clone(),
        source,
    })?;
    parse_document(path, &raw)
}

/// Atomically replace the document: tmp, backup, rename.
pub fn save_document(paths: &HarnessPaths, document: &TaskDocument) -> Result<(), StoreError> {
    let mut payload = serde_json::to_string_pretty(document)
        .map_err(|err| write_error(&paths.tmp_path, std::io::Error::other(err)))?;
    payload.push('\n');

    fs::write(&paths.tmp_path, payload).map_err(|err| write_error(&paths.tmp_path, err))?;
    match fs::copy(&paths.tasks_path, &paths.backup_path) {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(write_error(&paths.backup_path, err)),
    }
    fs::rename(&paths.tmp_path, &paths.tasks_path)
        .map_err(|err| write_error(&paths.tasks_path, err))?;
    debug!(path = %paths.tasks_path.display(), tasks = document.tasks.len(), "document saved");
    Ok(())
}

fn write_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Result of a locked read-modify-write.
#[derive(Debug, PartialEq, Eq)]
pub enum Update<T> {
    Applied(T),
    /// The lock stayed busy past the timeout; nothing was read or written.
    LockBusy,
}

/// Re-read the document under the state lock, apply `mutate`, and save if the
/// document changed.
///
/// A corrupt document is reported as an error and never overwritten.
pub fn update_document<T>(
    paths: &HarnessPaths,
    timeout: Duration,
    mutate: impl FnOnce(&mut TaskDocument) -> anyhow::Result<T>,
) -> anyhow::Result<Update<T>> {
    locked_update(paths, timeout, false, mutate)
}

/// Like [`update_document`], but a missing document is created (empty) under
/// the same lock before `mutate` runs.
pub fn create_or_update_document<T>(
    paths: &HarnessPaths,
    timeout: Duration,
    mutate: impl FnOnce(&mut TaskDocument) -> anyhow::Result<T>,
) -> anyhow::Result<Update<T>> {
    locked_update(paths, timeout, true, mutate)
}

fn locked_update<T>(
    paths: &HarnessPaths,
    timeout: Duration,
    create_missing: bool,
    mutate: impl FnOnce(&mut TaskDocument) -> anyhow::Result<T>,
) -> anyhow::Result<Update<T>> {
    let lock = DirLock::new(&paths.lock_dir);
    let _guard = match lock.acquire(timeout) {
        Ok(guard) => guard,
        Err(err @ LockError::TimedOut { .. }) => {
            info!(error = %err, "state lock busy; skipping update");
            return Ok(Update::LockBusy);
        }
        Err(err) => return Err(err.into()),
    };

    let created = create_missing && !paths.tasks_path.exists();
    let mut document = if created {
        info!(path = %paths.tasks_path.display(), "creating task document");
        TaskDocument::default()
    } else {
        load_document(paths)?
    };
    let before = document.clone();
    let out = mutate(&mut document)?;
    if created || document != before {
        save_document(paths, &document)?;
    }
    Ok(Update::Applied(out))
}

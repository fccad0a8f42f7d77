//! File layout of a state root.

use std::env;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub const TASKS_FILE: &str = "harness-tasks.json";
pub const CONFIG_FILE: &str = "harness-config.toml";
pub const PROGRESS_FILE: &str = "harness-progress.txt";
pub const ACTIVE_MARKER: &str = ".harness-active";
pub const REFLECT_MARKER: &str = ".harness-reflect";
pub const STOP_COUNTER_FILE: &str = ".harness-stop-counter";

/// Every path the harness touches for one state root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessPaths {
    pub root: PathBuf,
    pub tasks_path: PathBuf,
    pub backup_path: PathBuf,
    pub tmp_path: PathBuf,
    pub config_path: PathBuf,
    pub progress_path: PathBuf,
    pub active_marker: PathBuf,
    pub reflect_marker: PathBuf,
    pub stop_counter_path: PathBuf,
    /// Lock handle, outside the root so every process resolving the same root
    /// contends on the same directory.
    pub lock_dir: PathBuf,
}

impl HarnessPaths {
    /// Paths for `root`, canonicalized when it exists so that every spelling
    /// of the same directory maps to the same lock handle.
    pub fn new(root: &Path) -> Self {
        let root = &canonical_root(root);
        Self {
            root: root.to_path_buf(),
            tasks_path: root.join(TASKS_FILE),
            backup_path: root.join(format!("{TASKS_FILE}.bak")),
            tmp_path: root.join(format!("{TASKS_FILE}.tmp")),
            config_path: root.join(CONFIG_FILE),
            progress_path: root.join(PROGRESS_FILE),
            active_marker: root.join(ACTIVE_MARKER),
            reflect_marker: root.join(REFLECT_MARKER),
            stop_counter_path: root.join(STOP_COUNTER_FILE),
            lock_dir: lock_dir_for_root(root),
        }
    }

    /// `.harness-active` exists: orchestration hooks are live.
    pub fn is_active(&self) -> bool {
        self.active_marker.is_file()
    }

    /// `.harness-reflect` exists: one more reflection pass was requested.
    pub fn reflect_pending(&self) -> bool {
        self.reflect_marker.is_file()
    }
}

/// `root` with `.`/`..` and symlinks resolved; the raw path if it does not
/// exist yet.
pub fn canonical_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

/// 16 hex chars of the SHA-256 of `root`.
pub fn root_digest(root: &Path) -> String {
    let digest = Sha256::digest(root.to_string_lossy().as_bytes());
    hex::encode(&digest[..8])
}

pub fn lock_dir_for_root(root: &Path) -> PathBuf {
    shared_temp_dir().join(format!("harness-{}.lock", root_digest(root)))
}

#[cfg(unix)]
fn shared_temp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

#[cfg(not(unix))]
fn shared_temp_dir() -> PathBuf {
    env::temp_dir()
}

/// Per-session reflection counter under `dir`.
///
/// The session id is reduced to `[A-Za-z0-9_-]` so it cannot escape `dir`.
pub fn reflect_counter_path(dir: &Path, session_id: &str) -> PathBuf {
    let safe: String = session_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("harness-reflect-{safe}"))
}

/// Default directory for reflection counters.
pub fn reflect_counter_dir() -> PathBuf {
    env::temp_dir()
}

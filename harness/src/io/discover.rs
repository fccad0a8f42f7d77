//! Locate the state root: the directory holding `harness-tasks.json`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::io::config::HarnessEnv;
use crate::io::paths::{TASKS_FILE, canonical_root};

/// Ancestors searched above each discovery base.
pub const MAX_ANCESTORS: usize = 8;

/// Find the state root for an invocation.
///
/// Order: `HARNESS_STATE_ROOT` (only if it holds a task document), then
/// `CLAUDE_PROJECT_DIR` and its ancestors, then `cwd` and its ancestors.
pub fn find_state_root(env: &HarnessEnv, cwd: &Path) -> Option<PathBuf> {
    if let Some(root) = &env.state_root {
        if root.join(TASKS_FILE).is_file() {
            return Some(canonical_root(root));
        }
        debug!(root = %root.display(), "state root override has no task document");
    }

    let mut seen = HashSet::new();
    let bases = env.project_dir.iter().map(PathBuf::as_path).chain([cwd]);
    for base in bases {
        let Ok(base) = base.canonicalize() else {
            continue;
        };
        if !seen.insert(base.clone()) {
            continue;
        }
        if let Some(found) = base
            .ancestors()
            .take(MAX_ANCESTORS + 1)
            .find(|dir| dir.join(TASKS_FILE).is_file())
        {
            return Some(found.to_path_buf());
        }
    }
    None
}

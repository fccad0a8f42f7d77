//! `harness start`: open a new orchestration session.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::io::config::HarnessConfig;
use crate::io::counters::{remove_if_exists, touch};
use crate::io::paths::HarnessPaths;
use crate::io::progress::{self, session_line};
use crate::io::store::{Update, create_or_update_document};

/// Start a session under `root`, creating an empty task document if needed.
///
/// Creation and the session bump happen under one lock hold. Returns the new
/// session number, or `LockBusy` if the state lock could not be taken (nothing
/// is changed in that case).
pub fn start_session(root: &Path, config: &HarnessConfig) -> Result<Update<u32>> {
    fs::create_dir_all(root).with_context(|| format!("create {}", root.display()))?;
    let paths = HarnessPaths::new(root);

    let session = match create_or_update_document(&paths, config.lock_timeout(), |document| {
        document.session_count = document.session_count.saturating_add(1);
        Ok(document.session_count)
    })? {
        Update::Applied(session) => session,
        Update::LockBusy => return Ok(Update::LockBusy),
    };

    touch(&paths.active_marker)?;
    remove_if_exists(&paths.reflect_marker)?;
    remove_if_exists(&paths.stop_counter_path)?;
    progress::append(&paths.progress_path, &session_line(session, "START"))?;
    info!(session, root = %root.display(), "session started");
    Ok(Update::Applied(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestRoot, pending};

    #[test]
    fn creates_document_and_activates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("project");

        let session = start_session(&root, &HarnessConfig::default()).expect("start");
        assert_eq!(session, Update::Applied(1));

        let paths = HarnessPaths::new(&root);
        assert!(paths.tasks_path.is_file());
        assert!(paths.is_active());
        assert_eq!(
            fs::read_to_string(&paths.progress_path).expect("progress"),
            "[SESSION-1] START\n"
        );
    }

    #[test]
    fn increments_session_and_resets_markers() {
        let root = TestRoot::new().expect("root");
        root.write_tasks(vec![pending("t1")]).expect("seed");
        root.request_reflection().expect("reflect");
        root.write_stop_counter("3,0").expect("counter");

        start_session(root.path(), &HarnessConfig::default()).expect("first");
        let session = start_session(root.path(), &HarnessConfig::default()).expect("second");
        assert_eq!(session, Update::Applied(2));

        let document = root.read_document().expect("read");
        assert_eq!(document.session_count, 2);
        assert_eq!(document.tasks.len(), 1);
        assert!(!root.paths().reflect_pending());
        assert_eq!(root.read_stop_counter(), None);
    }

    #[test]
    fn concurrent_starts_count_every_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("project");
        let config = HarnessConfig {
            lock_timeout_ms: 30_000,
            ..HarnessConfig::default()
        };

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let root = root.clone();
                let config = config.clone();
                std::thread::spawn(move || start_session(&root, &config).expect("start"))
            })
            .collect();
        let mut sessions: Vec<u32> = handles
            .into_iter()
            .map(|handle| match handle.join().expect("thread") {
                Update::Applied(session) => session,
                Update::LockBusy => panic!("lock busy"),
            })
            .collect();
        sessions.sort_unstable();

        assert_eq!(sessions, vec![1, 2, 3, 4]);
        let document =
            crate::io::store::load_document(&HarnessPaths::new(&root)).expect("load");
        assert_eq!(document.session_count, 4);
    }
}

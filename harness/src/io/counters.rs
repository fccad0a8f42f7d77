//! Lock-free counter and marker files.
//!
//! These are written by one logical decision path per invocation, so they are
//! not guarded by the state lock. A lost race only affects loop patience.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::valve::StopCounter;

pub fn read_stop_counter(path: &Path) -> StopCounter {
    fs::read_to_string(path)
        .map(|raw| StopCounter::parse(&raw))
        .unwrap_or_default()
}

pub fn write_stop_counter(path: &Path, counter: StopCounter) -> Result<()> {
    fs::write(path, counter.render()).with_context(|| format!("write {}", path.display()))
}

/// Read the reflection count; missing or garbled files count as zero.
pub fn read_reflect_count(path: &Path) -> u32 {
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0)
}

pub fn write_reflect_count(path: &Path, count: u32) -> Result<()> {
    fs::write(path, count.to_string()).with_context(|| format!("write {}", path.display()))
}

/// Create an empty marker file.
pub fn touch(path: &Path) -> Result<()> {
    fs::write(path, "").with_context(|| format!("create {}", path.display()))
}

/// Remove a file; missing is fine.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_counter_defaults_when_missing_or_garbled() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".harness-stop-counter");
        assert_eq!(read_stop_counter(&path), StopCounter::default());

        fs::write(&path, "abc").expect("write");
        assert_eq!(read_stop_counter(&path), StopCounter::default());

        write_stop_counter(&path, StopCounter::parse("3,2")).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "3,2");
    }

    #[test]
    fn reflect_count_is_lenient() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("harness-reflect-s1");
        assert_eq!(read_reflect_count(&path), 0);
        fs::write(&path, " 4\n").expect("write");
        assert_eq!(read_reflect_count(&path), 4);
        fs::write(&path, "x").expect("write");
        assert_eq!(read_reflect_count(&path), 0);
    }

    #[test]
    fn remove_tolerates_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".harness-active");
        remove_if_exists(&path).expect("missing");
        touch(&path).expect("touch");
        remove_if_exists(&path).expect("remove");
        assert!(!path.exists());
    }
}

//! Append-only progress log (`harness-progress.txt`).
//!
//! Lines look like `[SESSION-3] Completed [t7]`.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

/// Only the tail of the log is scanned.
pub const TAIL_BYTES: u64 = 200_000;

static COMPLETED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[SESSION-(\d+)\]\s+Completed\b").expect("completed-line regex is valid")
});

pub fn session_line(session: u32, event: &str) -> String {
    format!("[SESSION-{session}] {event}")
}

pub fn append(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("append {}", path.display()))
}

/// Last `max_bytes` of the file, lossily decoded. Missing file reads as empty.
pub fn tail_text(path: &Path, max_bytes: u64) -> String {
    let Ok(mut file) = fs::File::open(path) else {
        return String::new();
    };
    let size = file.metadata().map(|meta| meta.len()).unwrap_or(0);
    if file
        .seek(SeekFrom::Start(size.saturating_sub(max_bytes)))
        .is_err()
    {
        return String::new();
    }
    let mut bytes = Vec::new();
    if file.read_to_end(&mut bytes).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Tasks logged as completed during `session`.
pub fn completed_in_session(path: &Path, session: u32) -> usize {
    tail_text(path, TAIL_BYTES)
        .lines()
        .filter_map(|line| COMPLETED_RE.captures(line.trim()))
        .filter(|caps| caps[1].parse::<u32>().ok() == Some(session))
        .count()
}

/// Last non-empty line, if any.
pub fn last_line(path: &Path) -> Option<String> {
    tail_text(path, TAIL_BYTES)
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

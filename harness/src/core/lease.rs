//! Lease bookkeeping: claiming, reaping, and external success/failure signals.
//!
//! Everything here mutates in-memory tasks only. Persisting the result is the
//! store's job, under the state lock.

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};

use crate::core::task::Task;
use crate::core::types::TaskStatus;

/// Prefix of the `error_log` entry appended when a lease expires.
pub const LEASE_TIMEOUT_TAG: &str = "[SESSION_TIMEOUT]";

/// Format as second-precision UTC with a `Z` suffix (`2026-01-02T03:04:05Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp; a missing offset is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Take ownership of `task` for `worker`.
///
/// With `ttl = None` (or one that overflows the calendar) no expiry is recorded
/// and the lease is never reaped by time.
pub fn claim(task: &mut Task, worker: &str, ttl: Option<Duration>, now: DateTime<Utc>) {
    task.status = TaskStatus::InProgress;
    task.claimed_by = Some(worker.to_string());
    task.claimed_at = Some(format_timestamp(now));
    task.lease_expires_at = ttl
        .and_then(|ttl| now.checked_add_signed(ttl))
        .map(format_timestamp);
}

/// Lease expiry of an in-progress task, if present and parseable.
pub fn lease_expiry(task: &Task) -> Option<DateTime<Utc>> {
    task.lease_expires_at.as_deref().and_then(parse_timestamp)
}

fn is_expired(task: &Task, now: DateTime<Utc>) -> bool {
    task.status == TaskStatus::InProgress && lease_expiry(task).is_some_and(|expiry| expiry <= now)
}

/// True when at least one in-progress lease has expired at `now`.
pub fn has_expired_leases(tasks: &[Task], now: DateTime<Utc>) -> bool {
    tasks.iter().any(|task| is_expired(task, now))
}

/// Force every expired lease back to `failed`.
///
/// Returns the reaped ids; an empty list means nothing changed. Tasks without a
/// parseable expiry are left alone.
pub fn reap_expired(tasks: &mut [Task], now: DateTime<Utc>) -> Vec<String> {
    let mut reaped = Vec::new();
    for task in tasks.iter_mut().filter(|task| is_expired(task, now)) {
        let holder = task.claimed_by.as_deref().unwrap_or("unknown");
        let message = format!("{LEASE_TIMEOUT_TAG} Lease expired (claimed_by={holder})");
        record_failure(task, message);
        reaped.push(task.id.clone());
    }
    reaped
}

/// External failure signal: `failed`, one more attempt, message appended.
pub fn record_failure(task: &mut Task, message: impl Into<String>) {
    task.status = TaskStatus::Failed;
    task.attempts = task.attempts.saturating_add(1);
    task.error_log.push(message.into());
    clear_lease(task);
}

/// External success signal.
pub fn record_completion(task: &mut Task) {
    task.status = TaskStatus::Completed;
    clear_lease(task);
}

fn clear_lease(task: &mut Task) {
    task.claimed_by = None;
    task.claimed_at = None;
    task.lease_expires_at = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{in_progress, pending};

    fn at(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).expect("timestamp")
    }

    #[test]
    fn claim_sets_holder_and_expiry() {
        let mut task = pending("t1");
        claim(
            &mut task,
            "w1",
            Some(Duration::seconds(90)),
            at("2026-01-01T00:00:00Z"),
        );
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.claimed_by.as_deref(), Some("w1"));
        assert_eq!(task.claimed_at.as_deref(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(task.lease_expires_at.as_deref(), Some("2026-01-01T00:01:30Z"));
    }

    #[test]
    fn reap_fails_expired_lease_once() {
        let mut tasks = vec![in_progress("t1", Some("w1"))];
        tasks[0].lease_expires_at = Some("2026-01-01T00:00:00Z".to_string());
        tasks[0].claimed_at = Some("2025-12-31T23:00:00Z".to_string());
        tasks[0].attempts = 1;

        let reaped = reap_expired(&mut tasks, at("2026-01-01T00:00:00Z"));
        assert_eq!(reaped, vec!["t1"]);
        let task = &tasks[0];
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.attempts, 2);
        assert_eq!(
            task.error_log,
            vec!["[SESSION_TIMEOUT] Lease expired (claimed_by=w1)".to_string()]
        );
        assert!(task.claimed_by.is_none());
        assert!(task.claimed_at.is_none());
        assert!(task.lease_expires_at.is_none());

        let snapshot = tasks.clone();
        let again = reap_expired(&mut tasks, at("2026-01-02T00:00:00Z"));
        assert!(again.is_empty());
        assert_eq!(tasks, snapshot);
    }

    #[test]
    fn unexpired_and_untracked_leases_are_kept() {
        let mut tasks = vec![
            in_progress("future", Some("w1")),
            in_progress("untracked", Some("w2")),
            in_progress("garbage", Some("w3")),
        ];
        tasks[0].lease_expires_at = Some("2026-01-01T00:00:01Z".to_string());
        tasks[2].lease_expires_at = Some("tomorrow-ish".to_string());

        let now = at("2026-01-01T00:00:00Z");
        assert!(!has_expired_leases(&tasks, now));
        assert!(reap_expired(&mut tasks, now).is_empty());
        assert!(
            tasks
                .iter()
                .all(|task| task.status == TaskStatus::InProgress)
        );
    }

    #[test]
    fn naive_timestamps_are_utc() {
        assert_eq!(
            parse_timestamp("2026-01-01T00:00:00"),
            Some(at("2026-01-01T00:00:00Z"))
        );
        assert_eq!(
            parse_timestamp("2026-01-01T02:00:00+02:00"),
            Some(at("2026-01-01T00:00:00Z"))
        );
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn completion_clears_the_lease() {
        let mut task = in_progress("t1", Some("w1"));
        task.lease_expires_at = Some("2026-01-01T00:00:00Z".to_string());
        record_completion(&mut task);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.claimed_by.is_none());
        assert!(task.lease_expires_at.is_none());
    }
}

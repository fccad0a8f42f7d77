//! Inter-process mutual exclusion via an atomically created directory.
//!
//! The holder writes its pid into `<lock>/pid`. A contender that finds a dead
//! holder (or a pid file that stays missing past a short grace window) renames
//! the directory to a unique scratch name, deletes it, and retries. The rename
//! decides which of several simultaneous contenders performs the takeover.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

/// Sleep between acquisition attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a lock without a readable pid is assumed to be mid-creation.
///
/// Takeover is check-then-rename: a contender that judged the holder stale can
/// be descheduled while another contender reclaims and re-creates the lock,
/// and then rename the new holder's directory away. The displaced pid is
/// logged at `warn` when that happens.
pub const MISSING_PID_GRACE: Duration = Duration::from_secs(1);

const PID_FILE: &str = "pid";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock {} busy after {waited:?} ({holder})", path.display())]
    TimedOut {
        path: PathBuf,
        waited: Duration,
        holder: String,
    },
    #[error("lock {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A lock directory path; cheap to construct, holds nothing until acquired.
#[derive(Debug, Clone)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is held or `timeout` elapses.
    pub fn acquire(&self, timeout: Duration) -> Result<LockGuard, LockError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut missing_pid_since: Option<Instant> = None;

        loop {
            match fs::create_dir(&self.path) {
                Ok(()) => {
                    if let Err(source) =
                        fs::write(self.path.join(PID_FILE), process::id().to_string())
                    {
                        let _ = fs::remove_dir_all(&self.path);
                        return Err(self.io_error(source));
                    }
                    debug!(path = %self.path.display(), "lock acquired");
                    return Ok(LockGuard {
                        path: self.path.clone(),
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => return Err(self.io_error(err)),
            }

            let holder = match read_pid(&self.path) {
                None => {
                    let since = *missing_pid_since.get_or_insert_with(Instant::now);
                    if since.elapsed() < MISSING_PID_GRACE {
                        self.wait_or_time_out(started, deadline, "pid missing")?;
                        continue;
                    }
                    None
                }
                Some(pid) => {
                    missing_pid_since = None;
                    if pid_alive(pid) {
                        self.wait_or_time_out(started, deadline, &format!("pid={pid}"))?;
                        continue;
                    }
                    Some(pid)
                }
            };

            match self.take_over(holder) {
                Ok(displaced) => {
                    warn!(path = %self.path.display(), holder = ?holder, "reclaimed stale lock");
                    if let Some(pid) = displaced {
                        warn!(
                            path = %self.path.display(),
                            stale = ?holder,
                            displaced = pid,
                            "lock changed hands during takeover; displaced a newer holder"
                        );
                    }
                    missing_pid_since = None;
                }
                Err(err) => {
                    debug!(path = %self.path.display(), error = %err, "stale lock takeover lost");
                    self.wait_or_time_out(started, deadline, "contention")?;
                }
            }
        }
    }

    /// Rename the stale directory out of the way, then delete it.
    ///
    /// Returns the pid found in the renamed directory when it is not the stale
    /// `holder` that was observed before the rename.
    fn take_over(&self, holder: Option<u32>) -> std::io::Result<Option<u32>> {
        let scratch = self.scratch_path();
        fs::rename(&self.path, &scratch)?;
        let found = read_pid(&scratch);
        let _ = fs::remove_dir_all(&scratch);
        Ok(found.filter(|pid| Some(*pid) != holder))
    }

    fn scratch_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "harness.lock".to_string());
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        self.path
            .with_file_name(format!("{name}.stale.{}.{nanos}", process::id()))
    }

    fn wait_or_time_out(
        &self,
        started: Instant,
        deadline: Instant,
        holder: &str,
    ) -> Result<(), LockError> {
        if Instant::now() >= deadline {
            return Err(LockError::TimedOut {
                path: self.path.clone(),
                waited: started.elapsed(),
                holder: holder.to_string(),
            });
        }
        thread::sleep(POLL_INTERVAL);
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        release(&self.path);
    }
}

/// Best-effort recursive removal; a missing handle is fine.
pub fn release(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "lock released"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "lock release failed"),
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let raw = fs::read_to_string(path.join(PID_FILE)).ok()?;
    raw.trim().parse().ok()
}

/// Signal 0 probe. `EPERM` means the process exists under another user.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    true
}

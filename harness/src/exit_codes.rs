//! Stable exit codes for harness CLI commands.

/// Command succeeded, or a hook delivered a soft decision on stdout.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, missing state root, or other errors.
pub const INVALID: i32 = 1;
/// A hook refused the host action (diagnostic on stderr).
pub const REFUSE: i32 = 2;
/// `harness claim` found no eligible task.
pub const NO_WORK: i32 = 3;
/// The state lock could not be acquired before the timeout.
pub const LOCK_BUSY: i32 = 4;

//! I/O helpers for harness commands.

pub mod config;
pub mod counters;
pub mod discover;
pub mod hook_log;
pub mod lock;
pub mod paths;
pub mod payload;
pub mod progress;
pub mod prompt;
pub mod store;
pub mod transcript;

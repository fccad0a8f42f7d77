//! Task orchestration for short-lived hook invocations.
//!
//! Workers are separate processes that run once per host event and exit. All
//! shared state lives in `harness-tasks.json` plus a few sibling marker files,
//! and mutations are serialized by a directory lock. The crate is split the
//! same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (eligibility, leases, ownership,
//!   safety valve, reflection steps, hook decisions). No I/O.
//! - **[`io`]**: Side effects (paths, discovery, config, document store, lock,
//!   counters, progress log, payload, transcript, prompt rendering).
//!
//! Orchestration modules ([`stop`], [`session_start`], [`idle`],
//! [`subagent_stop`], [`reflect`], [`start`], [`tasks`], [`status`]) combine the
//! two to implement CLI commands; [`hook`] carries the shared hook context.

pub mod core;
pub mod exit_codes;
pub mod hook;
pub mod idle;
pub mod io;
pub mod logging;
pub mod reflect;
pub mod session_start;
pub mod start;
pub mod status;
pub mod stop;
pub mod subagent_stop;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

//! Shared plumbing for hook invocations.
//!
//! A hook resolves its state root from the environment and payload, loads the
//! configuration next to the task document, and hands a [`HookContext`] to the
//! per-hook decision module. Hooks never fail: every error becomes a safe
//! decision inside those modules.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::decision::HookOutcome;
use crate::core::document::TaskDocument;
use crate::core::lease::{has_expired_leases, reap_expired};
use crate::io::config::{HarnessConfig, HarnessEnv, load_config_or_default};
use crate::io::discover::find_state_root;
use crate::io::hook_log;
use crate::io::paths::{HarnessPaths, reflect_counter_dir};
use crate::io::payload::HookPayload;
use crate::io::store::{StoreError, Update, load_document, update_document};
use crate::{idle, reflect, session_start, stop, subagent_stop};

/// Hook kinds exposed on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Stop,
    SessionStart,
    TeammateIdle,
    SubagentStop,
    Reflect,
}

impl Hook {
    pub fn name(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::SessionStart => "session-start",
            Self::TeammateIdle => "teammate-idle",
            Self::SubagentStop => "subagent-stop",
            Self::Reflect => "reflect",
        }
    }
}

/// Everything a hook decision needs besides the clock.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub paths: HarnessPaths,
    pub config: HarnessConfig,
    pub env: HarnessEnv,
    pub payload: HookPayload,
    /// Directory holding per-session reflection counters.
    pub reflect_dir: PathBuf,
}

impl HookContext {
    pub fn new(root: &Path, env: HarnessEnv, payload: HookPayload) -> Self {
        let paths = HarnessPaths::new(root);
        let config = load_config_or_default(&paths.config_path).with_env(&env);
        Self {
            paths,
            config,
            env,
            payload,
            reflect_dir: reflect_counter_dir(),
        }
    }

    /// Discover the state root for this invocation, if any.
    pub fn resolve(env: &HarnessEnv, payload: HookPayload, cwd: &Path) -> Option<Self> {
        let base = payload.cwd().unwrap_or_else(|| cwd.to_path_buf());
        let root = find_state_root(env, &base)?;
        debug!(root = %root.display(), "state root resolved");
        Some(Self::new(&root, env.clone(), payload))
    }

    /// `HARNESS_WORKER_ID`, else the payload's `teammate_name`, else `agent_id`.
    pub fn worker_id(&self) -> Option<&str> {
        self.env
            .worker_id
            .as_deref()
            .or_else(|| self.payload.teammate_name())
            .or_else(|| self.payload.agent_id())
    }

    pub fn log_event(&self, hook: Hook) {
        hook_log::record(
            self.env.hook_log.as_deref(),
            hook.name(),
            &self.paths.root,
            &self.payload,
        );
    }

    /// Load the document, reaping expired leases under the lock first.
    ///
    /// If the lock is busy or the locked update fails, the unreaped snapshot is
    /// returned unchanged.
    pub fn load_and_reap(&self, now: DateTime<Utc>) -> Result<TaskDocument, StoreError> {
        let snapshot = load_document(&self.paths)?;
        if !has_expired_leases(&snapshot.tasks, now) {
            return Ok(snapshot);
        }
        let reaped = update_document(&self.paths, self.config.lock_timeout(), |document| {
            let ids = reap_expired(&mut document.tasks, now);
            Ok((ids, document.clone()))
        });
        match reaped {
            Ok(Update::Applied((ids, document))) => {
                if !ids.is_empty() {
                    info!(tasks = ?ids, "reaped expired leases");
                }
                Ok(document)
            }
            Ok(Update::LockBusy) => Ok(snapshot),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "lease reaping failed; using snapshot");
                Ok(snapshot)
            }
        }
    }
}

/// Run one hook end to end.
///
/// No state root, or an inactive one (for every hook but `reflect`), means no
/// opinion.
pub fn run_hook(
    hook: Hook,
    env: &HarnessEnv,
    payload: HookPayload,
    cwd: &Path,
    now: DateTime<Utc>,
) -> HookOutcome {
    let Some(ctx) = HookContext::resolve(env, payload, cwd) else {
        debug!(hook = hook.name(), "no state root; no opinion");
        return HookOutcome::no_opinion();
    };
    if hook == Hook::Reflect {
        return reflect::run(&ctx);
    }
    if !ctx.paths.is_active() {
        debug!(hook = hook.name(), "harness inactive; no opinion");
        return HookOutcome::no_opinion();
    }
    ctx.log_event(hook);
    match hook {
        Hook::Stop => stop::run(&ctx, now),
        Hook::SessionStart => session_start::run(&ctx, now),
        Hook::TeammateIdle => idle::run(&ctx, now),
        Hook::SubagentStop => subagent_stop::run(&ctx, now),
        Hook::Reflect => reflect::run(&ctx),
    }
}

//! Harness configuration: `harness-config.toml` plus environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::reflect::DEFAULT_REFLECT_MAX_ITERATIONS;
use crate::core::valve::DEFAULT_MAX_CONSECUTIVE_BLOCKS;

/// Tunables read from `harness-config.toml` next to the task document.
///
/// Every field is optional in the file; missing fields keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// How long a mutating command waits for the state lock.
    pub lock_timeout_ms: u64,

    /// Lease length granted by `harness claim` when `--ttl-secs` is not given.
    pub lease_ttl_secs: u64,

    /// Consecutive no-progress Stop blocks before the safety valve may open.
    pub max_consecutive_blocks: u32,

    /// Reflection cycles per session; `0` disables the loop.
    pub reflect_max_iterations: u32,

    /// Truncate the quoted original request beyond this many characters.
    pub original_prompt_limit_chars: usize,

    /// Only the first this-many bytes of a transcript are scanned.
    pub transcript_max_bytes: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            lease_ttl_secs: 30 * 60,
            max_consecutive_blocks: DEFAULT_MAX_CONSECUTIVE_BLOCKS,
            reflect_max_iterations: DEFAULT_REFLECT_MAX_ITERATIONS,
            original_prompt_limit_chars: 2_000,
            transcript_max_bytes: 100_000,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(anyhow!("lock_timeout_ms must be > 0"));
        }
        if self.lease_ttl_secs == 0 {
            return Err(anyhow!("lease_ttl_secs must be > 0"));
        }
        if self.max_consecutive_blocks == 0 {
            return Err(anyhow!("max_consecutive_blocks must be > 0"));
        }
        if self.original_prompt_limit_chars == 0 {
            return Err(anyhow!("original_prompt_limit_chars must be > 0"));
        }
        if self.transcript_max_bytes == 0 {
            return Err(anyhow!("transcript_max_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lease_ttl(&self) -> chrono::Duration {
        ttl_from_secs(self.lease_ttl_secs)
    }

    /// Apply environment overrides on top of the file values.
    pub fn with_env(mut self, env: &HarnessEnv) -> Self {
        if let Some(max) = env.reflect_max_iterations {
            self.reflect_max_iterations = max;
        }
        self
    }
}

/// Lease length for `secs`, saturating at the largest representable span.
pub fn ttl_from_secs(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        return Ok(HarnessConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Like [`load_config`], but an unreadable or invalid file falls back to
/// defaults. Hooks use this; they must not fail on a bad config.
pub fn load_config_or_default(path: &Path) -> HarnessConfig {
    match load_config(path) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{err:#}"), "ignoring invalid config");
            HarnessConfig::default()
        }
    }
}

/// Environment inputs, captured once per process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessEnv {
    /// `HARNESS_STATE_ROOT`: explicit state root, wins over discovery.
    pub state_root: Option<PathBuf>,
    /// `CLAUDE_PROJECT_DIR`: extra discovery base, searched before the cwd.
    pub project_dir: Option<PathBuf>,
    /// `HARNESS_WORKER_ID`: worker identity override.
    pub worker_id: Option<String>,
    /// `REFLECT_MAX_ITERATIONS`, already parsed.
    pub reflect_max_iterations: Option<u32>,
    /// `HARNESS_HOOK_LOG`: append-only JSONL debug log.
    pub hook_log: Option<PathBuf>,
}

impl HarnessEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            state_root: get("HARNESS_STATE_ROOT").map(PathBuf::from),
            project_dir: get("CLAUDE_PROJECT_DIR").map(PathBuf::from),
            worker_id: get("HARNESS_WORKER_ID").map(|value| value.trim().to_string()),
            reflect_max_iterations: lookup("REFLECT_MAX_ITERATIONS")
                .map(|raw| parse_reflect_max(&raw)),
            hook_log: get("HARNESS_HOOK_LOG").map(PathBuf::from),
        }
    }
}

/// Unparsable values mean the default; zero or negative disables the loop.
fn parse_reflect_max(raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(value) if value <= 0 => 0,
        Ok(value) => u32::try_from(value).unwrap_or(u32::MAX),
        Err(_) => DEFAULT_REFLECT_MAX_ITERATIONS,
    }
}

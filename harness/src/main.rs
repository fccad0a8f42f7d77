//! Task orchestration hooks and operator commands.
//!
//! Hook subcommands read the host payload from stdin and answer with a JSON
//! decision on stdout (exit 0) or a refusal on stderr (exit 2). Operator
//! subcommands manage the task document directly.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::warn;

use harness::core::decision::HookOutcome;
use harness::exit_codes;
use harness::hook::{Hook, run_hook};
use harness::io::config::{HarnessConfig, HarnessEnv, load_config, ttl_from_secs};
use harness::io::discover::find_state_root;
use harness::io::paths::HarnessPaths;
use harness::io::payload::HookPayload;
use harness::io::store::Update;
use harness::logging;
use harness::start::start_session;
use harness::status::status;
use harness::tasks::{ClaimOutcome, ClaimTarget, claim, complete, fail, reap};

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Task orchestration for short-lived hook invocations"
)]
struct Cli {
    /// State root (directory holding harness-tasks.json). Discovered from the
    /// working directory when omitted.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stop hook: block while orchestrated work remains.
    Stop,
    /// SessionStart hook: inject a status summary.
    SessionStart,
    /// TeammateIdle hook: refuse idling while work is owned or eligible.
    TeammateIdle,
    /// SubagentStop hook: block while the subagent holds in-progress work.
    SubagentStop,
    /// Stop hook for the bounded self-reflection loop after the harness drains.
    Reflect,
    /// Open a new session: create the document if needed and activate hooks.
    Start,
    /// Claim the next eligible task (or `--task`) for a worker.
    Claim {
        #[arg(long)]
        worker: String,
        /// Claim this task instead of the head of the eligibility order.
        #[arg(long)]
        task: Option<String>,
        /// Lease length; 0 records no expiry. Defaults to `lease_ttl_secs`.
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Mark a task completed.
    Complete {
        id: String,
        /// Reject the signal unless this worker still holds the lease.
        #[arg(long)]
        worker: Option<String>,
    },
    /// Mark a task failed and record the error.
    Fail {
        id: String,
        #[arg(long)]
        error: String,
        /// Reject the signal unless this worker still holds the lease.
        #[arg(long)]
        worker: Option<String>,
    },
    /// Fail every task whose lease has expired.
    Reap,
    /// Print a JSON status summary.
    Status,
}

impl Command {
    fn hook(&self) -> Option<Hook> {
        match self {
            Self::Stop => Some(Hook::Stop),
            Self::SessionStart => Some(Hook::SessionStart),
            Self::TeammateIdle => Some(Hook::TeammateIdle),
            Self::SubagentStop => Some(Hook::SubagentStop),
            Self::Reflect => Some(Hook::Reflect),
            _ => None,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let mut env = HarnessEnv::from_env();

    let code = if let Some(hook) = cli.command.hook() {
        if let Some(root) = cli.root {
            env.state_root = Some(root);
        }
        run_hook_command(hook, &env)
    } else {
        match run_operator(cli.command, cli.root.as_deref(), &env) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{:#}", err);
                exit_codes::INVALID
            }
        }
    };
    std::process::exit(code);
}

fn run_hook_command(hook: Hook, env: &HarnessEnv) -> i32 {
    let payload = HookPayload::from_reader(io::stdin().lock());
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let outcome = run_hook(hook, env, payload, &cwd, Utc::now());
    emit(&outcome)
}

/// Write a hook outcome in the host's wire format and return the exit code.
fn emit(outcome: &HookOutcome) -> i32 {
    if let Some(warning) = &outcome.warning {
        eprintln!("WARN: {warning}");
    }
    match outcome.decision.stdout_json() {
        Ok(Some(line)) => println!("{line}"),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "failed to serialize hook decision"),
    }
    if let Some(message) = outcome.decision.stderr_message() {
        eprintln!("{message}");
    }
    outcome.decision.exit_code()
}

fn run_operator(command: Command, root: Option<&Path>, env: &HarnessEnv) -> Result<i32> {
    let cwd = env::current_dir().context("resolve current directory")?;

    if let Command::Start = command {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => find_state_root(env, &cwd).unwrap_or(cwd),
        };
        let config = load_config(&HarnessPaths::new(&root).config_path)?;
        return Ok(match start_session(&root, &config)? {
            Update::Applied(session) => {
                println!("session {session} started in {}", root.display());
                exit_codes::OK
            }
            Update::LockBusy => lock_busy(),
        });
    }

    let paths = resolve_paths(root, env, &cwd)?;
    let config = load_config(&paths.config_path)?;
    match command {
        Command::Claim {
            worker,
            task,
            ttl_secs,
        } => cmd_claim(&paths, &config, &worker, task, ttl_secs),
        Command::Complete { id, worker } => {
            applied(complete(&paths, &config, &id, worker.as_deref())?, |task| {
                println!("completed {}", task.id);
            })
        }
        Command::Fail { id, error, worker } => applied(
            fail(&paths, &config, &id, &error, worker.as_deref())?,
            |task| {
                println!(
                    "failed {} (attempt {}/{})",
                    task.id,
                    task.attempts,
                    task.max_attempts()
                );
            },
        ),
        Command::Reap => applied(reap(&paths, &config, Utc::now())?, |ids| {
            println!("{}", ids.len());
        }),
        Command::Status => {
            let report = status(&paths)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serialize status")?
            );
            Ok(exit_codes::OK)
        }
        Command::Stop
        | Command::SessionStart
        | Command::TeammateIdle
        | Command::SubagentStop
        | Command::Reflect
        | Command::Start => bail!("not an operator command"),
    }
}

fn resolve_paths(root: Option<&Path>, env: &HarnessEnv, cwd: &Path) -> Result<HarnessPaths> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => find_state_root(env, cwd).with_context(|| {
            format!(
                "no harness-tasks.json found from {}; pass --root",
                cwd.display()
            )
        })?,
    };
    let paths = HarnessPaths::new(&root);
    if !paths.tasks_path.is_file() {
        bail!("{} does not exist", paths.tasks_path.display());
    }
    Ok(paths)
}

fn cmd_claim(
    paths: &HarnessPaths,
    config: &HarnessConfig,
    worker: &str,
    task: Option<String>,
    ttl_secs: Option<u64>,
) -> Result<i32> {
    let target = task.map_or(ClaimTarget::Next, ClaimTarget::Task);
    let ttl = match ttl_secs {
        Some(0) => None,
        Some(secs) => Some(ttl_from_secs(secs)),
        None => Some(config.lease_ttl()),
    };
    Ok(
        match claim(paths, config, worker, &target, ttl, Utc::now())? {
            ClaimOutcome::Claimed(task) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&task).context("serialize task")?
                );
                exit_codes::OK
            }
            ClaimOutcome::NoEligibleTask => {
                eprintln!("no eligible task");
                exit_codes::NO_WORK
            }
            ClaimOutcome::LockBusy => lock_busy(),
        },
    )
}

fn applied<T>(update: Update<T>, report: impl FnOnce(T)) -> Result<i32> {
    Ok(match update {
        Update::Applied(value) => {
            report(value);
            exit_codes::OK
        }
        Update::LockBusy => lock_busy(),
    })
}

fn lock_busy() -> i32 {
    eprintln!("state lock busy; try again");
    exit_codes::LOCK_BUSY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_claim() {
        let cli = Cli::parse_from(["harness", "claim", "--worker", "w1", "--ttl-secs", "60"]);
        assert!(matches!(
            cli.command,
            Command::Claim {
                ref worker,
                task: None,
                ttl_secs: Some(60),
            } if worker == "w1"
        ));
    }

    #[test]
    fn parse_global_root_after_subcommand() {
        let cli = Cli::parse_from(["harness", "status", "--root", "/srv/state"]);
        assert_eq!(cli.root.as_deref(), Some(Path::new("/srv/state")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn hook_commands_map_to_hooks() {
        let cli = Cli::parse_from(["harness", "teammate-idle"]);
        assert_eq!(cli.command.hook(), Some(Hook::TeammateIdle));
        let cli = Cli::parse_from(["harness", "fail", "t1", "--error", "boom"]);
        assert_eq!(cli.command.hook(), None);
    }
}

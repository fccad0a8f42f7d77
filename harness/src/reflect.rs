//! Bounded self-reflection loop, run from the Stop hook after the harness has
//! drained.
//!
//! Active only while the task document exists, `.harness-active` is absent and
//! `.harness-reflect` is present. Each session gets at most
//! `reflect_max_iterations` reflection blocks.

use tracing::{debug, info, warn};

use crate::core::decision::{HookDecision, HookOutcome};
use crate::core::reflect::{ReflectStep, next_step};
use crate::hook::{Hook, HookContext};
use crate::io::counters::{read_reflect_count, remove_if_exists, write_reflect_count};
use crate::io::paths::reflect_counter_path;
use crate::io::prompt::PromptEngine;
use crate::io::transcript::extract_original_prompt;

pub fn run(ctx: &HookContext) -> HookOutcome {
    let Some(session_id) = ctx.payload.session_id() else {
        debug!("no session id; reflection skipped");
        return HookOutcome::no_opinion();
    };
    if ctx.paths.is_active() || !ctx.paths.reflect_pending() {
        return HookOutcome::no_opinion();
    }
    ctx.log_event(Hook::Reflect);

    let counter_path = reflect_counter_path(&ctx.reflect_dir, session_id);
    let count = read_reflect_count(&counter_path);
    match next_step(count, ctx.config.reflect_max_iterations) {
        ReflectStep::Disabled => HookOutcome::no_opinion(),
        ReflectStep::Exhausted => {
            info!(session = session_id, count, "reflection budget used up");
            for path in [&ctx.paths.reflect_marker, &counter_path] {
                if let Err(err) = remove_if_exists(path) {
                    warn!(error = %format!("{err:#}"), "cleanup after reflection failed");
                }
            }
            HookOutcome::no_opinion()
        }
        ReflectStep::Reflect { iteration, max } => {
            if let Err(err) = write_reflect_count(&counter_path, iteration) {
                warn!(error = %format!("{err:#}"), "failed to persist reflection count");
            }
            let original_request = ctx
                .payload
                .transcript_path()
                .map(|path| {
                    extract_original_prompt(
                        &path,
                        ctx.config.transcript_max_bytes,
                        ctx.config.original_prompt_limit_chars,
                    )
                })
                .unwrap_or_default();
            let rendered = PromptEngine::new()
                .and_then(|engine| engine.render_reflect(iteration, max, &original_request));
            match rendered {
                Ok(reason) => HookDecision::block(reason).into(),
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "reflection prompt failed to render");
                    HookOutcome::no_opinion()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::HarnessEnv;
    use crate::io::payload::HookPayload;
    use crate::test_support::{TestRoot, completed};
    use std::fs;

    struct Fixture {
        root: TestRoot,
        counters: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TestRoot::new().expect("root");
            root.write_tasks(vec![completed("t1")]).expect("seed");
            root.request_reflection().expect("marker");
            let counters = tempfile::tempdir().expect("tempdir");
            Self { root, counters }
        }

        fn run(&self, max: Option<u32>, payload: &str) -> HookOutcome {
            let env = HarnessEnv {
                reflect_max_iterations: max,
                ..HarnessEnv::default()
            };
            let mut ctx = HookContext::new(self.root.path(), env, HookPayload::parse(payload));
            ctx.reflect_dir = self.counters.path().to_path_buf();
            run(&ctx)
        }
    }

    #[test]
    fn five_reflections_then_silence() {
        let fixture = Fixture::new();
        for iteration in 1..=5 {
            match fixture.run(Some(5), r#"{"session_id":"s1"}"#).decision {
                HookDecision::Block { reason } => {
                    assert!(reason.contains(&format!("{iteration}/5")), "{reason}");
                }
                other => panic!("expected block, got {other:?}"),
            }
        }
        let outcome = fixture.run(Some(5), r#"{"session_id":"s1"}"#);
        assert_eq!(outcome.decision, HookDecision::NoOpinion);
        assert!(!fixture.root.paths().reflect_pending());
        assert!(!reflect_counter_path(fixture.counters.path(), "s1").exists());
    }

    #[test]
    fn zero_max_is_silent_and_keeps_the_marker() {
        let fixture = Fixture::new();
        for _ in 0..3 {
            let outcome = fixture.run(Some(0), r#"{"session_id":"s1"}"#);
            assert_eq!(outcome.decision, HookDecision::NoOpinion);
        }
        assert!(fixture.root.paths().reflect_pending());
    }

    #[test]
    fn quotes_the_original_request() {
        let fixture = Fixture::new();
        let transcript = fixture.counters.path().join("t.jsonl");
        fs::write(&transcript, r#"{"role":"user","content":"Ship the lock rewrite"}"#)
            .expect("write");
        let payload = serde_json::json!({
            "session_id": "s2",
            "transcript_path": transcript.display().to_string(),
        })
        .to_string();
        match fixture.run(None, &payload).decision {
            HookDecision::Block { reason } => {
                assert!(reason.contains("1/5"), "{reason}");
                assert!(reason.contains("Ship the lock rewrite"), "{reason}");
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn guards_require_drained_harness_and_session_id() {
        let fixture = Fixture::new();
        assert_eq!(fixture.run(None, "{}").decision, HookDecision::NoOpinion);

        fixture.root.activate().expect("activate");
        assert_eq!(
            fixture.run(None, r#"{"session_id":"s1"}"#).decision,
            HookDecision::NoOpinion
        );
    }
}

//! Step logic for the bounded post-drain reflection loop.

/// Reflection cycles granted per session when nothing is configured.
pub const DEFAULT_REFLECT_MAX_ITERATIONS: u32 = 5;

/// What one reflection invocation should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectStep {
    /// Loop disabled (`max == 0`): allow silently, touch nothing.
    Disabled,
    /// Budget used up: allow, drop the marker and the counter.
    Exhausted,
    /// Block with reflection prompt `iteration` of `max`; persist `iteration`.
    Reflect { iteration: u32, max: u32 },
}

/// Decide the step given `count` cycles already issued.
pub fn next_step(count: u32, max: u32) -> ReflectStep {
    if max == 0 {
        return ReflectStep::Disabled;
    }
    if count >= max {
        return ReflectStep::Exhausted;
    }
    ReflectStep::Reflect {
        iteration: count + 1,
        max,
    }
}

/// Truncate to at most `limit` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_up_to_max_then_exhausts() {
        let steps: Vec<ReflectStep> = (0..=5).map(|count| next_step(count, 5)).collect();
        assert_eq!(
            steps[0],
            ReflectStep::Reflect {
                iteration: 1,
                max: 5
            }
        );
        assert_eq!(
            steps[4],
            ReflectStep::Reflect {
                iteration: 5,
                max: 5
            }
        );
        assert_eq!(steps[5], ReflectStep::Exhausted);
        assert_eq!(next_step(40, 5), ReflectStep::Exhausted);
    }

    #[test]
    fn zero_max_disables() {
        assert_eq!(next_step(0, 0), ReflectStep::Disabled);
        assert_eq!(next_step(3, 0), ReflectStep::Disabled);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }
}

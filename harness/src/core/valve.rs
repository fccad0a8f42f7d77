//! Termination safety valve for repeated Stop re-invocation.
//!
//! A Stop decision that keeps blocking without any task being completed is
//! counted. Once the count reaches the threshold and the host reports that its
//! own re-entrancy guard is active, the block is converted into an allow.

/// Consecutive no-progress blocks tolerated before the valve opens.
pub const DEFAULT_MAX_CONSECUTIVE_BLOCKS: u32 = 10;

/// Persisted valve state (`.harness-stop-counter`, text `"<blocks>,<completed>"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopCounter {
    /// Block decisions issued since the last observed progress.
    pub consecutive_blocks: u32,
    /// Completed-task count observed at the last block decision.
    pub last_completed: u32,
}

impl StopCounter {
    /// Parse the counter file; unreadable fields count as zero.
    pub fn parse(raw: &str) -> Self {
        let mut fields = raw.trim().split(',').map(|field| field.trim().parse::<u32>().ok());
        let consecutive_blocks = fields.next().flatten().unwrap_or(0);
        let last_completed = fields.next().flatten().unwrap_or(0);
        Self {
            consecutive_blocks,
            last_completed,
        }
    }

    pub fn render(&self) -> String {
        format!("{},{}", self.consecutive_blocks, self.last_completed)
    }

    /// Counter after one more block decision with `completed` tasks done.
    ///
    /// Progress since the last observation restarts the count at 1.
    pub fn record_block(self, completed: u32) -> Self {
        if completed > self.last_completed {
            return Self {
                consecutive_blocks: 1,
                last_completed: completed,
            };
        }
        Self {
            consecutive_blocks: self.consecutive_blocks.saturating_add(1),
            last_completed: completed,
        }
    }
}

/// Valve decision for a would-be block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveVerdict {
    /// Keep blocking; persist the updated counter.
    Block(StopCounter),
    /// Allow termination regardless of remaining work.
    Release(StopCounter),
}

/// Run the valve for a block decision.
///
/// The block that would be the `threshold`-th consecutive one without progress
/// is released when `reentrant` is set.
pub fn evaluate(
    counter: StopCounter,
    completed: u32,
    threshold: u32,
    reentrant: bool,
) -> ValveVerdict {
    let next = counter.record_block(completed);
    if reentrant && next.consecutive_blocks >= threshold {
        ValveVerdict::Release(next)
    } else {
        ValveVerdict::Block(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_defensive() {
        assert_eq!(
            StopCounter::parse("9,0"),
            StopCounter {
                consecutive_blocks: 9,
                last_completed: 0
            }
        );
        assert_eq!(StopCounter::parse("4").consecutive_blocks, 4);
        assert_eq!(StopCounter::parse("junk,2"), StopCounter {
            consecutive_blocks: 0,
            last_completed: 2
        });
        assert_eq!(StopCounter::parse(""), StopCounter::default());
    }

    #[test]
    fn releases_at_threshold_only_when_reentrant() {
        let threshold = DEFAULT_MAX_CONSECUTIVE_BLOCKS;
        let mut counter = StopCounter::default();
        for _ in 1..threshold {
            match evaluate(counter, 0, threshold, true) {
                ValveVerdict::Block(next) => counter = next,
                ValveVerdict::Release(_) => panic!("released early at {counter:?}"),
            }
        }
        assert_eq!(counter.consecutive_blocks, threshold - 1);

        assert!(matches!(
            evaluate(counter, 0, threshold, false),
            ValveVerdict::Block(_)
        ));
        assert!(matches!(
            evaluate(counter, 0, threshold, true),
            ValveVerdict::Release(_)
        ));
    }

    #[test]
    fn progress_resets_the_patience_window() {
        let counter = StopCounter::parse("7,0");
        assert_eq!(
            evaluate(counter, 1, DEFAULT_MAX_CONSECUTIVE_BLOCKS, true),
            ValveVerdict::Block(StopCounter::parse("1,1"))
        );
        assert_eq!(StopCounter::parse("1,1").render(), "1,1");
    }

    #[test]
    fn stays_escalated_without_progress() {
        let counter = StopCounter::parse("25,3");
        assert!(matches!(
            evaluate(counter, 3, DEFAULT_MAX_CONSECUTIVE_BLOCKS, true),
            ValveVerdict::Release(StopCounter {
                consecutive_blocks: 26,
                last_completed: 3
            })
        ));
    }
}

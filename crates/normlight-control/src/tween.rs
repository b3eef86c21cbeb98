//! Transition emulation for fixtures without native fades
//!
//! A tween is a short sequence of actual-brightness writes spaced evenly over
//! the requested duration. It runs as its own task so the owning proxy can
//! cancel it the moment a new command arrives.

use std::time::Duration;
use tokio::task::JoinHandle;

/// Precomputed write sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweenPlan {
    /// Actual values to write, in order; the last one is the target
    pub steps: Vec<u8>,
    /// Delay between consecutive writes; the first step goes out at once and
    /// the last lands at the full duration
    pub interval: Duration,
}

impl TweenPlan {
    /// Plan a linear tween from `from` to `to`.
    ///
    /// The step count is `duration / step_interval`, clamped to
    /// `1..=max_steps`. Values progress monotonically; repeats (including
    /// the starting value) are dropped.
    pub fn linear(from: u8, to: u8, duration: Duration, step_interval: Duration, max_steps: u32) -> Self {
        let step_ms = step_interval.as_millis().max(1);
        let count = (duration.as_millis() / step_ms).clamp(1, max_steps.max(1) as u128) as u32;

        let from_i = from as i64;
        let delta = to as i64 - from_i;
        let mut steps: Vec<u8> = Vec::with_capacity(count as usize);
        let mut prev = from;
        for i in 1..=count as i64 {
            let value = from_i + (2 * delta * i + count as i64 * delta.signum()) / (2 * count as i64);
            let value = value.clamp(0, 255) as u8;
            if value != prev {
                steps.push(value);
                prev = value;
            }
        }
        if steps.last() != Some(&to) {
            steps.push(to);
        }

        let interval = if steps.len() > 1 {
            duration / (steps.len() - 1) as u32
        } else {
            Duration::ZERO
        };
        Self { steps, interval }
    }

    /// True when the whole transition collapses into one write
    pub fn is_single_step(&self) -> bool {
        self.steps.len() <= 1
    }
}

/// Handle to a running tween task
#[derive(Debug)]
pub struct TweenHandle {
    handle: JoinHandle<()>,
}

impl TweenHandle {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop without waiting; for use where awaiting is impossible
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Stop the tween and wait until its task is gone, so no further step
    /// can reach the sink after this returns.
    pub async fn cancel(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_plan_up() {
        let plan = TweenPlan::linear(0, 100, Duration::from_secs(1), Duration::from_millis(100), 50);
        assert_eq!(plan.steps.len(), 10);
        assert_eq!(plan.steps.first(), Some(&10));
        assert_eq!(plan.steps.last(), Some(&100));
        assert!(plan.steps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(plan.interval, Duration::from_secs(1) / 9);
    }

    #[test]
    fn test_last_step_lands_at_full_duration() {
        let plan = TweenPlan::linear(200, 0, Duration::from_millis(500), Duration::from_millis(100), 50);
        assert_eq!(plan.interval, Duration::from_millis(125));
        let last_at = plan.interval * (plan.steps.len() - 1) as u32;
        assert_eq!(last_at, Duration::from_millis(500));
        assert!(!plan.is_single_step());
    }

    #[test]
    fn test_linear_plan_down() {
        let plan = TweenPlan::linear(200, 0, Duration::from_millis(500), Duration::from_millis(100), 50);
        assert_eq!(plan.steps, vec![160, 120, 80, 40, 0]);
    }

    #[test]
    fn test_max_steps_caps_count() {
        let plan = TweenPlan::linear(0, 255, Duration::from_secs(60), Duration::from_millis(100), 8);
        assert_eq!(plan.steps.len(), 8);
        assert_eq!(plan.steps.last(), Some(&255));
    }

    #[test]
    fn test_small_delta_dedupes() {
        let plan = TweenPlan::linear(100, 103, Duration::from_secs(1), Duration::from_millis(100), 50);
        assert_eq!(plan.steps, vec![101, 102, 103]);
    }

    #[test]
    fn test_short_duration_is_single_step() {
        let plan = TweenPlan::linear(0, 180, Duration::from_millis(30), Duration::from_millis(100), 50);
        assert!(plan.is_single_step());
        assert_eq!(plan.steps, vec![180]);
    }

    #[test]
    fn test_no_change() {
        let plan = TweenPlan::linear(90, 90, Duration::from_secs(2), Duration::from_millis(100), 50);
        assert_eq!(plan.steps, vec![90]);
    }
}

//! Per-frame time budget for chunk builds
//!
//! Chunk work runs until a wall-clock deadline. A large backlog earns a
//! larger slice so streaming catches up faster after a teleport or a render
//! distance change; otherwise the small slice keeps frames smooth.

use std::time::{Duration, Instant};

/// Two-tier frame budget
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameBudget {
    /// Slice used while the add backlog is at or below the threshold
    small: Duration,
    /// Slice used while the add backlog exceeds the threshold
    large: Duration,
    /// Add-queue length above which the large slice applies
    backlog_threshold: usize,
}

impl FrameBudget {
    pub const DEFAULT_SMALL: Duration = Duration::from_millis(10);
    pub const DEFAULT_LARGE: Duration = Duration::from_millis(30);
    pub const DEFAULT_BACKLOG_THRESHOLD: usize = 30;

    /// Create a budget
    ///
    /// # Arguments
    /// * `small` - Slice for a short backlog
    /// * `large` - Slice for a long backlog
    /// * `backlog_threshold` - Add-queue length above which `large` applies
    pub fn new(small: Duration, large: Duration, backlog_threshold: usize) -> Self {
        Self {
            small,
            large,
            backlog_threshold,
        }
    }

    pub fn small(&self) -> Duration {
        self.small
    }

    pub fn large(&self) -> Duration {
        self.large
    }

    pub fn backlog_threshold(&self) -> usize {
        self.backlog_threshold
    }

    /// Whether a backlog of `pending_adds` earns the large slice
    pub fn is_backlogged(&self, pending_adds: usize) -> bool {
        pending_adds > self.backlog_threshold
    }

    /// Time allowed this frame for a given add backlog
    pub fn slice_for(&self, pending_adds: usize) -> Duration {
        if self.is_backlogged(pending_adds) {
            self.large
        } else {
            self.small
        }
    }

    /// Deadline for work started at `now`
    pub fn deadline(&self, now: Instant, pending_adds: usize) -> Instant {
        now + self.slice_for(pending_adds)
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SMALL, Self::DEFAULT_LARGE, Self::DEFAULT_BACKLOG_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_defaults() {
        let budget = FrameBudget::default();
        assert_eq!(budget.small(), Duration::from_millis(10));
        assert_eq!(budget.large(), Duration::from_millis(30));
        assert_eq!(budget.backlog_threshold(), 30);
    }

    #[test]
    fn test_budget_threshold_is_exclusive() {
        let budget = FrameBudget::default();
        assert_eq!(budget.slice_for(0), Duration::from_millis(10));
        assert_eq!(budget.slice_for(30), Duration::from_millis(10));
        assert_eq!(budget.slice_for(31), Duration::from_millis(30));
        assert!(!budget.is_backlogged(30));
        assert!(budget.is_backlogged(31));
    }

    #[test]
    fn test_budget_custom_threshold() {
        let budget = FrameBudget::new(Duration::from_millis(2), Duration::from_millis(8), 5);
        assert_eq!(budget.slice_for(5), Duration::from_millis(2));
        assert_eq!(budget.slice_for(6), Duration::from_millis(8));
    }

    #[test]
    fn test_budget_deadline() {
        let budget = FrameBudget::default();
        let now = Instant::now();
        assert_eq!(budget.deadline(now, 100), now + Duration::from_millis(30));
        assert_eq!(budget.deadline(now, 1), now + Duration::from_millis(10));
    }
}

//! Episode reward statistics

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Mean of the last `window` values, or 0 for an empty slice
#[must_use]
pub fn moving_average(values: &[f64], window: usize) -> f64 {
    let start = values.len().saturating_sub(window.max(1));
    let tail = &values[start..];
    if tail.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = tail.len() as f64;
    tail.iter().sum::<f64>() / len
}

/// Per-episode rewards and their smoothed curve
///
/// Both series keep at most `capacity` points, dropping the oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeStats {
    window: usize,
    capacity: usize,
    episodes: usize,
    rewards: VecDeque<f64>,
    smoothed: VecDeque<f64>,
}

impl EpisodeStats {
    /// Create empty statistics
    #[must_use]
    pub fn new(window: usize, capacity: usize) -> Self {
        Self {
            window: window.max(1),
            capacity: capacity.max(1),
            episodes: 0,
            rewards: VecDeque::new(),
            smoothed: VecDeque::new(),
        }
    }

    /// Record a finished episode's total reward; returns the new moving average
    pub fn record(&mut self, total_reward: f64) -> f64 {
        self.episodes += 1;
        self.rewards.push_back(total_reward);
        if self.rewards.len() > self.capacity {
            self.rewards.pop_front();
        }
        let average = moving_average(self.rewards.make_contiguous(), self.window);
        self.smoothed.push_back(average);
        if self.smoothed.len() > self.capacity {
            self.smoothed.pop_front();
        }
        average
    }

    /// Episodes recorded since the last reset
    #[must_use]
    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Retained raw rewards, oldest first
    pub fn rewards(&self) -> impl Iterator<Item = f64> + '_ {
        self.rewards.iter().copied()
    }

    /// Retained moving averages, oldest first
    pub fn smoothed(&self) -> impl Iterator<Item = f64> + '_ {
        self.smoothed.iter().copied()
    }

    /// Most recent moving average
    #[must_use]
    pub fn latest_average(&self) -> Option<f64> {
        self.smoothed.back().copied()
    }

    /// Forget every episode
    pub fn clear(&mut self) {
        self.episodes = 0;
        self.rewards.clear();
        self.smoothed.clear();
    }
}

impl Default for EpisodeStats {
    fn default() -> Self {
        Self::new(20, 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_moving_average() {
        assert_eq!(moving_average(&[], 3), 0.0);
        assert_relative_eq!(moving_average(&[1.0, 2.0], 3), 1.5);
        assert_relative_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0], 2), 3.5);
    }

    #[test]
    fn test_record_caps_history() {
        let mut stats = EpisodeStats::new(2, 3);
        for reward in [1.0, 2.0, 3.0, 4.0] {
            stats.record(reward);
        }

        assert_eq!(stats.episodes(), 4);
        assert_eq!(stats.rewards().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(stats.smoothed().collect::<Vec<_>>(), vec![1.5, 2.5, 3.5]);
        assert_eq!(stats.latest_average(), Some(3.5));

        stats.clear();
        assert_eq!(stats.episodes(), 0);
        assert_eq!(stats.latest_average(), None);
    }
}

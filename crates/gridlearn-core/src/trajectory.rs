//! Episode trajectory storage for Monte Carlo control

use serde::{Deserialize, Serialize};

use crate::{Action, StateKey};

/// One visited `(state, action, reward)` triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    /// State the action was taken in
    pub state: StateKey,
    /// Action taken
    pub action: Action,
    /// Reward received for it
    pub reward: f64,
}

/// Ordered record of the current episode
#[derive(Debug, Clone, Default)]
pub struct TrajectoryBuffer {
    entries: Vec<TrajectoryEntry>,
}

impl TrajectoryBuffer {
    /// Create a new empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn push(&mut self, state: StateKey, action: Action, reward: f64) {
        self.entries.push(TrajectoryEntry {
            state,
            action,
            reward,
        });
    }

    /// Number of recorded steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded steps in visitation order
    #[must_use]
    pub fn entries(&self) -> &[TrajectoryEntry] {
        &self.entries
    }

    /// Drop every recorded step
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sum of undiscounted rewards
    #[must_use]
    pub fn total_reward(&self) -> f64 {
        self.entries.iter().map(|e| e.reward).sum()
    }

    /// Discounted return from every step, in visitation order
    #[must_use]
    pub fn returns(&self, gamma: f64) -> Vec<f64> {
        let mut returns = vec![0.0; self.len()];
        let mut running_return = 0.0;

        for (i, entry) in self.entries.iter().enumerate().rev() {
            running_return = entry.reward + gamma * running_return;
            returns[i] = running_return;
        }

        returns
    }

    /// Empty the buffer, yielding each step with its return, last step first
    pub fn drain_with_returns(&mut self, gamma: f64) -> impl Iterator<Item = (TrajectoryEntry, f64)> + '_ {
        let mut running_return = 0.0;
        self.entries.drain(..).rev().map(move |entry| {
            running_return = entry.reward + gamma * running_return;
            (entry, running_return)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn three_step() -> TrajectoryBuffer {
        let mut buffer = TrajectoryBuffer::new();
        buffer.push(StateKey::new(0, 0), Action::Right, -0.1);
        buffer.push(StateKey::new(1, 0), Action::Down, -0.1);
        buffer.push(StateKey::new(1, 1), Action::Right, 1.0);
        buffer
    }

    #[test]
    fn test_returns_are_discounted_backwards() {
        let returns = three_step().returns(0.9);
        assert_relative_eq!(returns[2], 1.0);
        assert_relative_eq!(returns[1], -0.1 + 0.9 * 1.0);
        assert_relative_eq!(returns[0], -0.1 + 0.9 * (-0.1 + 0.9 * 1.0));
    }

    #[test]
    fn test_drain_yields_reverse_order_and_empties() {
        let mut buffer = three_step();
        let expected = buffer.returns(0.5);
        let drained: Vec<_> = buffer.drain_with_returns(0.5).collect();

        let states: Vec<_> = drained.iter().map(|(e, _)| e.state).collect();
        assert_eq!(
            states,
            vec![StateKey::new(1, 1), StateKey::new(1, 0), StateKey::new(0, 0)]
        );
        for (k, (_, g)) in drained.iter().enumerate() {
            assert_relative_eq!(*g, expected[2 - k]);
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_total_reward() {
        assert_relative_eq!(three_step().total_reward(), 0.8);
    }
}

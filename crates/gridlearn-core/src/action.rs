//! Grid actions and per-action value vectors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::LearnError;

/// One of the four moves available in every grid state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Move towards y = 0
    Up,
    /// Move towards y = size - 1
    Down,
    /// Move towards x = 0
    Left,
    /// Move towards x = size - 1
    Right,
}

impl Action {
    /// Every action, in the fixed order used by all tables
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Number of actions
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this action in [`Action::ALL`]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
        }
    }

    /// Coordinate delta `(dx, dy)` of this move
    #[must_use]
    pub fn delta(self) -> (isize, isize) {
        match self {
            Action::Up => (0, -1),
            Action::Down => (0, 1),
            Action::Left => (-1, 0),
            Action::Right => (1, 0),
        }
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = LearnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Action::Up),
            "down" => Ok(Action::Down),
            "left" => Ok(Action::Left),
            "right" => Ok(Action::Right),
            other => Err(LearnError::Other(anyhow::anyhow!("unknown action: {other}"))),
        }
    }
}

/// A real value for each of the four actions
///
/// Used for Q-values, actor preferences and action probabilities alike.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionValues {
    /// Value of [`Action::Up`]
    pub up: f64,
    /// Value of [`Action::Down`]
    pub down: f64,
    /// Value of [`Action::Left`]
    pub left: f64,
    /// Value of [`Action::Right`]
    pub right: f64,
}

impl ActionValues {
    /// All actions set to the same value
    #[must_use]
    pub fn splat(value: f64) -> Self {
        Self {
            up: value,
            down: value,
            left: value,
            right: value,
        }
    }

    /// Uniform distribution over the four actions
    #[must_use]
    pub fn uniform() -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::splat(1.0 / Action::COUNT as f64)
    }

    /// Build from a function of the action
    pub fn from_fn(mut f: impl FnMut(Action) -> f64) -> Self {
        Self {
            up: f(Action::Up),
            down: f(Action::Down),
            left: f(Action::Left),
            right: f(Action::Right),
        }
    }

    /// Iterate `(action, value)` pairs in [`Action::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = (Action, f64)> + '_ {
        Action::ALL.iter().map(move |&a| (a, self[a]))
    }

    /// Largest value
    #[must_use]
    pub fn max(&self) -> f64 {
        self.iter().map(|(_, v)| v).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Sum of all values
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.iter().map(|(_, v)| v).sum()
    }

    /// Every action whose value equals the maximum, in [`Action::ALL`] order
    ///
    /// Never empty: if no value compares equal to the maximum (all NaN),
    /// every action is returned.
    #[must_use]
    pub fn argmax_set(&self) -> Vec<Action> {
        let max = self.max();
        let best: Vec<Action> = self
            .iter()
            .filter(|&(_, v)| v == max)
            .map(|(a, _)| a)
            .collect();
        if best.is_empty() {
            Action::ALL.to_vec()
        } else {
            best
        }
    }

    /// Multiply every value by `factor`
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self::from_fn(|a| self[a] * factor)
    }
}

impl Index<Action> for ActionValues {
    type Output = f64;

    fn index(&self, action: Action) -> &f64 {
        match action {
            Action::Up => &self.up,
            Action::Down => &self.down,
            Action::Left => &self.left,
            Action::Right => &self.right,
        }
    }
}

impl IndexMut<Action> for ActionValues {
    fn index_mut(&mut self, action: Action) -> &mut f64 {
        match action {
            Action::Up => &mut self.up,
            Action::Down => &mut self.down,
            Action::Left => &mut self.left,
            Action::Right => &mut self.right,
        }
    }
}

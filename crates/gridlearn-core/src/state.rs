//! Discrete grid states

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Action, LearnError};

/// A grid coordinate `(x, y)`, used both as table key and agent position
///
/// Ordered by `x` then `y`, which is also the row order of the
/// successor-representation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    /// Column
    pub x: usize,
    /// Row
    pub y: usize,
}

impl StateKey {
    /// Create a new state key
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Whether the state lies inside an `n x n` grid
    #[must_use]
    pub fn in_grid(self, grid_size: usize) -> bool {
        self.x < grid_size && self.y < grid_size
    }

    /// Dense index of this state in an `n x n` grid, if inside it
    #[must_use]
    pub fn index(self, grid_size: usize) -> Option<usize> {
        self.in_grid(grid_size).then(|| self.x * grid_size + self.y)
    }

    /// Inverse of [`StateKey::index`]
    #[must_use]
    pub fn from_index(index: usize, grid_size: usize) -> Self {
        Self::new(index / grid_size, index % grid_size)
    }

    /// The neighbouring cell in the direction of `action`, if it lies inside the grid
    #[must_use]
    pub fn neighbour(self, action: Action, grid_size: usize) -> Option<Self> {
        let (dx, dy) = action.delta();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        let next = Self::new(x, y);
        next.in_grid(grid_size).then_some(next)
    }

    /// Every state of an `n x n` grid, in index order
    pub fn all(grid_size: usize) -> impl Iterator<Item = StateKey> {
        (0..grid_size).flat_map(move |x| (0..grid_size).map(move |y| StateKey::new(x, y)))
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for StateKey {
    type Err = LearnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| LearnError::InvalidStateKey(s.to_string()))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| LearnError::InvalidStateKey(s.to_string()))
        };
        Ok(Self::new(parse(x)?, parse(y)?))
    }
}

impl From<(usize, usize)> for StateKey {
    fn from((x, y): (usize, usize)) -> Self {
        Self::new(x, y)
    }
}

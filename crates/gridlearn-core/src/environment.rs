//! Environment contract consumed by the learning core

use serde::{Deserialize, Serialize};

use crate::{Action, StateKey};

/// Result of taking one action from a position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State key of the cell the agent ends up in
    pub next_state: StateKey,
    /// Reward for entering `next_state`
    pub reward: f64,
    /// Agent position after the move
    pub new_position: StateKey,
    /// Whether the episode ended
    pub done: bool,
}

/// Transition function of the environment
///
/// This is the only capability the learning core needs from an environment.
/// It takes `&self`: the successor-representation lookahead calls it for
/// every candidate action without moving the agent.
pub trait Dynamics {
    /// Outcome of taking `action` from `position` on an `n x n` grid
    fn step(&self, action: Action, position: StateKey, grid_size: usize) -> Transition;
}

impl<F> Dynamics for F
where
    F: Fn(Action, StateKey, usize) -> Transition,
{
    fn step(&self, action: Action, position: StateKey, grid_size: usize) -> Transition {
        self(action, position, grid_size)
    }
}

/// Full environment driven by a session: dynamics plus episode reset
pub trait Environment: Dynamics {
    /// Side length of the grid
    fn grid_size(&self) -> usize;

    /// Return the agent to its start cell and report that position
    fn reset(&mut self) -> StateKey;

    /// Rebuild the environment for an `n x n` grid
    fn resize(&mut self, grid_size: usize) -> crate::Result<()>;
}

//! Deterministic grid world with gems, traps and walls

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gridlearn_core::tables::MAX_GRID_SIZE;
use gridlearn_core::{
    Action, Dynamics, Environment, LearnError, Result, StateKey, Transition,
};

/// Contents of one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    /// Free cell
    #[default]
    Empty,
    /// Positive reward
    Gem,
    /// Negative reward; always ends the episode
    Trap,
    /// Impassable
    Wall,
}

impl Cell {
    /// Next state in the edit cycle `Empty → Gem → Trap → Wall → Empty`
    #[must_use]
    pub fn cycled(self) -> Self {
        match self {
            Cell::Empty => Cell::Gem,
            Cell::Gem => Cell::Trap,
            Cell::Trap => Cell::Wall,
            Cell::Wall => Cell::Empty,
        }
    }

    fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Gem => 'G',
            Cell::Trap => 'T',
            Cell::Wall => '#',
        }
    }
}

/// Grid world configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridWorldConfig {
    /// Side length of the grid
    pub size: usize,
    /// Start cell
    pub start: StateKey,
    /// Reward for every move that does not reach a gem or trap
    pub step_penalty: f64,
    /// Reward for reaching a gem
    pub gem_reward: f64,
    /// Reward for reaching a trap
    pub trap_reward: f64,
    /// Whether reaching a gem ends the episode
    pub terminate_on_gem: bool,
}

impl Default for GridWorldConfig {
    fn default() -> Self {
        Self {
            size: 5,
            start: StateKey::new(0, 0),
            step_penalty: -0.1,
            gem_reward: 1.0,
            trap_reward: -1.0,
            terminate_on_gem: true,
        }
    }
}

impl GridWorldConfig {
    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `n x n` grid world
///
/// The agent moves one cell per action. Moving off the grid or into a wall
/// leaves it in place. Rewards depend on the cell the agent occupies after
/// the move.
#[derive(Debug, Clone)]
pub struct GridWorld {
    config: GridWorldConfig,
    cells: Vec<Cell>,
}

impl GridWorld {
    /// Create a grid with the default layout and the configured start
    pub fn new(config: GridWorldConfig) -> Result<Self> {
        let (size, start) = (config.size, config.start);
        let mut env = Self {
            cells: Vec::new(),
            config,
        };
        env.resize(size)?;
        env.set_start(start)?;
        Ok(env)
    }

    /// Cell at `state`, if inside the grid
    #[must_use]
    pub fn cell(&self, state: StateKey) -> Option<Cell> {
        state
            .index(self.config.size)
            .and_then(|i| self.cells.get(i).copied())
    }

    /// Replace the cell at `state`
    ///
    /// The start cell must stay empty.
    pub fn set_cell(&mut self, state: StateKey, cell: Cell) -> Result<()> {
        let index = self.index_of(state)?;
        if state == self.config.start && cell != Cell::Empty {
            return Err(LearnError::InvalidCell {
                state,
                reason: "the start cell must stay empty",
            });
        }
        self.cells[index] = cell;
        Ok(())
    }

    /// Advance the cell at `state` one step through the edit cycle
    pub fn cycle_cell(&mut self, state: StateKey) -> Result<Cell> {
        let current = self
            .cell(state)
            .ok_or(LearnError::StateOutOfGrid {
                state,
                grid_size: self.config.size,
            })?;
        let next = current.cycled();
        self.set_cell(state, next)?;
        debug!(%state, ?next, "cell cycled");
        Ok(next)
    }

    /// Move the start cell
    ///
    /// Rejects cells outside the grid, walls, gems and traps.
    pub fn set_start(&mut self, state: StateKey) -> Result<()> {
        let index = self.index_of(state)?;
        let reason = match self.cells[index] {
            Cell::Empty => None,
            Cell::Wall => Some("the start cannot be a wall"),
            Cell::Gem | Cell::Trap => Some("the start cannot be a reward cell"),
        };
        if let Some(reason) = reason {
            return Err(LearnError::InvalidCell { state, reason });
        }
        self.config.start = state;
        Ok(())
    }

    /// Start cell
    #[must_use]
    pub fn start(&self) -> StateKey {
        self.config.start
    }

    /// Set the reward for ordinary moves
    pub fn set_step_penalty(&mut self, penalty: f64) {
        self.config.step_penalty = penalty;
    }

    /// Choose whether gems end the episode
    pub fn set_terminate_on_gem(&mut self, terminate: bool) {
        self.config.terminate_on_gem = terminate;
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &GridWorldConfig {
        &self.config
    }

    fn index_of(&self, state: StateKey) -> Result<usize> {
        state
            .index(self.config.size)
            .ok_or(LearnError::StateOutOfGrid {
                state,
                grid_size: self.config.size,
            })
    }

    fn default_layout(size: usize) -> Vec<Cell> {
        let mut cells = vec![Cell::Empty; size * size];
        if size >= 2 {
            if let Some(i) = StateKey::new(size - 1, size - 1).index(size) {
                cells[i] = Cell::Gem;
            }
        }
        if size >= 3 {
            if let Some(i) = StateKey::new(size - 1, 0).index(size) {
                cells[i] = Cell::Trap;
            }
        }
        cells
    }
}

impl Default for GridWorld {
    fn default() -> Self {
        let size = GridWorldConfig::default().size;
        Self {
            cells: Self::default_layout(size),
            config: GridWorldConfig::default(),
        }
    }
}

impl Dynamics for GridWorld {
    fn step(&self, action: Action, position: StateKey, grid_size: usize) -> Transition {
        let next = position
            .neighbour(action, grid_size)
            .filter(|s| self.cell(*s) != Some(Cell::Wall))
            .unwrap_or(position);
        let (reward, done) = match self.cell(next) {
            Some(Cell::Gem) => (self.config.gem_reward, self.config.terminate_on_gem),
            Some(Cell::Trap) => (self.config.trap_reward, true),
            Some(Cell::Empty | Cell::Wall) | None => (self.config.step_penalty, false),
        };
        Transition {
            next_state: next,
            reward,
            new_position: next,
            done,
        }
    }
}

impl Environment for GridWorld {
    fn grid_size(&self) -> usize {
        self.config.size
    }

    fn reset(&mut self) -> StateKey {
        self.config.start
    }

    /// Rebuild the default layout for `grid_size`; the start returns to `(0, 0)`
    fn resize(&mut self, grid_size: usize) -> Result<()> {
        if grid_size == 0 || grid_size > MAX_GRID_SIZE {
            return Err(LearnError::InvalidGridSize(grid_size));
        }
        self.config.size = grid_size;
        self.config.start = StateKey::new(0, 0);
        self.cells = Self::default_layout(grid_size);
        info!(grid_size, "grid world layout reset");
        Ok(())
    }
}

impl fmt::Display for GridWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.config.size;
        for y in 0..n {
            for x in 0..n {
                let state = StateKey::new(x, y);
                let symbol = if state == self.config.start {
                    'S'
                } else {
                    self.cell(state).map_or('?', Cell::symbol)
                };
                write!(f, "{symbol}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

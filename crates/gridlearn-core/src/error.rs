//! Error types for the grid learning core

use thiserror::Error;

use crate::StateKey;

/// Core error type for configuration, construction and validation
///
/// Learning steps never return these: every condition a step can hit is
/// recoverable and reported through `tracing` instead.
#[derive(Error, Debug)]
pub enum LearnError {
    /// Algorithm identifier not recognised
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Exploration strategy identifier not recognised
    #[error("unknown exploration strategy: {0}")]
    UnknownStrategy(String),

    /// Parameter outside its valid range
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: f64,
    },

    /// Grid size of zero or too large to index
    #[error("invalid grid size: {0}")]
    InvalidGridSize(usize),

    /// State outside the current grid
    #[error("state {state} is outside a {grid_size}x{grid_size} grid")]
    StateOutOfGrid {
        /// Offending state
        state: StateKey,
        /// Grid size the state was checked against
        grid_size: usize,
    },

    /// State key could not be parsed
    #[error("invalid state key: {0}")]
    InvalidStateKey(String),

    /// Cell cannot hold the requested role
    #[error("invalid cell {state}: {reason}")]
    InvalidCell {
        /// Cell position
        state: StateKey,
        /// Why the change was refused
        reason: &'static str,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for grid learning operations
pub type Result<T> = std::result::Result<T, LearnError>;

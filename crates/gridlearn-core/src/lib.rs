//! Core tables and types for tabular grid-world reinforcement learning
//!
//! This crate provides the learned-state store shared by every algorithm,
//! the discrete action and state types, the environment contract and the
//! learner configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod config;
pub mod environment;
pub mod error;
pub mod state;
pub mod tables;
pub mod trajectory;

// Re-export core traits and types
pub use action::{Action, ActionValues};
pub use config::{
    Algorithm, AlgorithmSelection, ExplorationStrategy, LearnerConfig, LearningRates,
    RatePurpose, SrLookahead, StrategySelection,
};
pub use environment::{Dynamics, Environment, Transition};
pub use error::{LearnError, Result};
pub use state::StateKey;
pub use tables::{TableSnapshot, TableStore};
pub use trajectory::{TrajectoryBuffer, TrajectoryEntry};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, ActionValues, Algorithm, Dynamics, Environment, ExplorationStrategy,
        LearnerConfig, Result, StateKey, TableStore, Transition,
    };
}

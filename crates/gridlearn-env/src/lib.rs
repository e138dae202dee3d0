//! Grid-world environment for gridlearn
//!
//! A deterministic `n x n` grid with gem, trap and wall cells implementing
//! the [`gridlearn_core::Environment`] contract.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod grid;

pub use grid::{Cell, GridWorld, GridWorldConfig};

// Re-export core types
pub use gridlearn_core::{Action, Dynamics, Environment, StateKey, Transition};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Cell, GridWorld, GridWorldConfig};
    pub use gridlearn_core::prelude::*;
}

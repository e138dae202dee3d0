//! Learning engines for tabular grid-world reinforcement learning
//!
//! This crate provides six algorithms behind one learner:
//! - Q-learning, SARSA and Expected SARSA
//! - Every-visit Monte Carlo control
//! - Actor-Critic with softmax preferences
//! - Successor representation
//!
//! plus the episode session and a timer-driven tick loop.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod driver;
pub mod learner;
pub mod policy;
pub mod session;
pub mod stats;
pub mod successor;
pub mod update;

// Re-export the learner surface
pub use learner::{Learner, StepResult};
pub use session::{
    EpisodeEnd, EpisodePhase, EpisodeSummary, Session, SessionConfig, TickOutcome,
};
pub use driver::{DriverReport, StopReason, TickDriver};

// Re-export engines
pub use policy::{PolicyEngine, PROBABILITY_TOLERANCE};
pub use update::{apply_monte_carlo, Experience, UpdateEngine, UpdateOutcome};
pub use stats::{moving_average, EpisodeStats};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Learner, Session, SessionConfig, StepResult, TickDriver, TickOutcome,
    };
    pub use gridlearn_core::prelude::*;
}

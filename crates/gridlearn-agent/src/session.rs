//! Episode bookkeeping around a learner and an environment
//!
//! A session owns the learner, the environment and the agent position, and
//! drives the per-episode state machine: `Idle`, then `Stepping` until the
//! environment signals `done` or the step ceiling is reached. Both endings
//! run the same bookkeeping: Monte Carlo flush, statistics, environment
//! reset.

use chrono::{DateTime, Utc};
use metrics::{gauge, increment_counter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gridlearn_core::{AlgorithmSelection, Environment, LearnError, Result, StateKey};

use crate::learner::{Learner, StepResult};
use crate::stats::EpisodeStats;

/// Episode limits and statistics settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Step ceiling after which an episode is truncated
    pub max_steps_per_episode: usize,
    /// Episodes in the reward moving average
    pub moving_average_window: usize,
    /// Episode rewards kept in the history
    pub history_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_steps_per_episode: 100,
            moving_average_window: 20,
            history_capacity: 500,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Every count must be at least 1
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_steps_per_episode", self.max_steps_per_episode),
            ("moving_average_window", self.moving_average_window),
            ("history_capacity", self.history_capacity),
        ] {
            if value == 0 {
                return Err(LearnError::InvalidParameter { name, value: 0.0 });
            }
        }
        Ok(())
    }
}

/// Where the current episode is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// No step taken since the last episode boundary
    Idle,
    /// At least one step taken
    Stepping,
}

/// How an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeEnd {
    /// The environment reported `done`
    Terminated,
    /// The step ceiling was reached first
    Truncated,
}

/// Record of a finished episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Episode ID
    pub id: Uuid,
    /// 1-based episode number since the last agent reset
    pub number: usize,
    /// Total reward
    pub total_reward: f64,
    /// Number of steps
    pub steps: usize,
    /// Whether episode was truncated
    pub truncated: bool,
    /// Reward moving average including this episode
    pub moving_average: f64,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: DateTime<Utc>,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A step was taken and the episode goes on
    Continued(StepResult),
    /// A step was taken and ended the episode
    EpisodeFinished {
        /// The final step
        step: StepResult,
        /// Bookkeeping for the finished episode
        summary: EpisodeSummary,
    },
    /// The learner cannot update with its current configuration
    Stopped,
}

/// A learner, its environment and the running episode
#[derive(Debug)]
pub struct Session<E> {
    learner: Learner,
    env: E,
    config: SessionConfig,
    position: StateKey,
    phase: EpisodePhase,
    episode_id: Uuid,
    episode_steps: usize,
    episode_reward: f64,
    episode_start: DateTime<Utc>,
    stats: EpisodeStats,
}

impl<E: Environment> Session<E> {
    /// Create a session with the agent at the environment's start cell
    ///
    /// The learner's tables are reinitialised for the environment's grid.
    pub fn new(mut learner: Learner, mut env: E, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        learner.initialize_tables(env.grid_size())?;
        let position = env.reset();
        let stats = EpisodeStats::new(config.moving_average_window, config.history_capacity);
        Ok(Self {
            learner,
            env,
            config,
            position,
            phase: EpisodePhase::Idle,
            episode_id: Uuid::new_v4(),
            episode_steps: 0,
            episode_reward: 0.0,
            episode_start: Utc::now(),
            stats,
        })
    }

    /// Take one learning step and run episode-end bookkeeping if it ended
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase == EpisodePhase::Idle {
            self.phase = EpisodePhase::Stepping;
            self.episode_id = Uuid::new_v4();
            self.episode_start = Utc::now();
        }

        let grid_size = self.env.grid_size();
        let step = self.learner.learning_step(self.position, grid_size, &self.env);
        if step.needs_stop {
            warn!(episode = %self.episode_id, "learner requested a stop");
            return TickOutcome::Stopped;
        }

        self.episode_steps += 1;
        self.episode_reward += step.reward;
        self.position = step.new_position;

        let end = if step.done {
            Some(EpisodeEnd::Terminated)
        } else if self.episode_steps >= self.config.max_steps_per_episode {
            Some(EpisodeEnd::Truncated)
        } else {
            None
        };

        match end {
            Some(end) => TickOutcome::EpisodeFinished {
                step,
                summary: self.finish_episode(end),
            },
            None => TickOutcome::Continued(step),
        }
    }

    fn finish_episode(&mut self, end: EpisodeEnd) -> EpisodeSummary {
        let flushed = self.learner.apply_monte_carlo_updates();
        let moving_average = self.stats.record(self.episode_reward);
        let summary = EpisodeSummary {
            id: self.episode_id,
            number: self.stats.episodes(),
            total_reward: self.episode_reward,
            steps: self.episode_steps,
            truncated: end == EpisodeEnd::Truncated,
            moving_average,
            start_time: self.episode_start,
            end_time: Utc::now(),
        };

        let outcome = match end {
            EpisodeEnd::Terminated => "terminated",
            EpisodeEnd::Truncated => "truncated",
        };
        increment_counter!("gridlearn_episodes_total", "end" => outcome);
        gauge!("gridlearn_episode_reward", summary.total_reward);
        gauge!("gridlearn_episode_reward_moving_average", moving_average);
        debug!(
            episode = summary.number,
            reward = summary.total_reward,
            steps = summary.steps,
            moving_average,
            flushed,
            outcome,
            "episode finished"
        );

        self.clear_episode();
        summary
    }

    fn clear_episode(&mut self) {
        self.learner.clear_trajectory();
        self.phase = EpisodePhase::Idle;
        self.episode_steps = 0;
        self.episode_reward = 0.0;
        self.position = self.env.reset();
    }

    /// Tick until `episodes` more episodes finish or the learner stops
    pub fn run_episodes(&mut self, episodes: usize) -> Vec<EpisodeSummary> {
        let mut summaries = Vec::with_capacity(episodes);
        while summaries.len() < episodes {
            match self.tick() {
                TickOutcome::Continued(_) => {}
                TickOutcome::EpisodeFinished { summary, .. } => summaries.push(summary),
                TickOutcome::Stopped => break,
            }
        }
        summaries
    }

    /// Forget everything learned: tables, trajectory, statistics and the
    /// current episode
    pub fn reset_agent(&mut self) -> Result<()> {
        self.learner.initialize_tables(self.env.grid_size())?;
        self.stats.clear();
        self.clear_episode();
        info!(grid_size = self.env.grid_size(), "agent reset");
        Ok(())
    }

    /// Restore the environment's default layout and restart the episode
    ///
    /// Learned tables are kept.
    pub fn reset_environment(&mut self) -> Result<()> {
        self.env.resize(self.env.grid_size())?;
        self.clear_episode();
        info!("environment reset");
        Ok(())
    }

    /// Resize the grid, resetting both the environment and the agent
    pub fn resize_grid(&mut self, grid_size: usize) -> Result<()> {
        self.env.resize(grid_size)?;
        self.reset_agent()
    }

    /// Select a new algorithm and reset the agent
    pub fn switch_algorithm(&mut self, algorithm: impl Into<AlgorithmSelection>) -> Result<()> {
        self.learner.set_algorithm(algorithm);
        self.reset_agent()
    }

    /// Set the step ceiling for episodes
    pub fn set_max_steps_per_episode(&mut self, max_steps: usize) -> Result<()> {
        let config = SessionConfig {
            max_steps_per_episode: max_steps,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// The learner
    #[must_use]
    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    /// Mutable learner, for parameter changes between ticks
    pub fn learner_mut(&mut self) -> &mut Learner {
        &mut self.learner
    }

    /// The environment
    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Mutable environment, for layout edits between ticks
    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Learner and environment together, for policy queries
    pub fn parts_mut(&mut self) -> (&mut Learner, &E) {
        (&mut self.learner, &self.env)
    }

    /// Agent position
    #[must_use]
    pub fn position(&self) -> StateKey {
        self.position
    }

    /// Current episode phase
    #[must_use]
    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    /// Steps taken in the current episode
    #[must_use]
    pub fn episode_steps(&self) -> usize {
        self.episode_steps
    }

    /// Reward collected in the current episode
    #[must_use]
    pub fn episode_reward(&self) -> f64 {
        self.episode_reward
    }

    /// Episode statistics
    #[must_use]
    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    /// Session settings
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

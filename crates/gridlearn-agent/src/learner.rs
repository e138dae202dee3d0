//! Learner facade: owned tables, configuration and the learning step

use metrics::increment_counter;
use ndarray::ArrayView1;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gridlearn_core::{
    Action, ActionValues, Algorithm, AlgorithmSelection, Dynamics, ExplorationStrategy,
    LearnError, LearnerConfig, Result, StateKey, StrategySelection, TableSnapshot, TableStore,
    TrajectoryBuffer,
};

use crate::policy::PolicyEngine;
use crate::successor;
use crate::update::{apply_monte_carlo, Experience, UpdateEngine, UpdateOutcome};

/// Outcome of one learning step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// The caller must stop driving steps; no update rule exists
    pub needs_stop: bool,
    /// Agent position after the step
    pub new_position: StateKey,
    /// Reward received
    pub reward: f64,
    /// Whether the environment ended the episode
    pub done: bool,
    /// Action taken, if any
    pub action: Option<Action>,
}

impl StepResult {
    fn stopped(position: StateKey) -> Self {
        Self {
            needs_stop: true,
            new_position: position,
            reward: 0.0,
            done: false,
            action: None,
        }
    }
}

/// Tabular learner for a single session
///
/// Owns the table store, the Monte Carlo trajectory and the random number
/// generator. Parameter changes take effect on the next step.
#[derive(Debug)]
pub struct Learner {
    config: LearnerConfig,
    store: TableStore,
    trajectory: TrajectoryBuffer,
    rng: StdRng,
}

impl Learner {
    /// Create a learner with tables for an `n x n` grid
    pub fn new(config: LearnerConfig, grid_size: usize) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            algorithm = %config.algorithm,
            grid_size,
            "learner created"
        );
        Ok(Self {
            store: TableStore::new(grid_size)?,
            trajectory: TrajectoryBuffer::new(),
            config,
            rng,
        })
    }

    /// Clear every table and the trajectory, allocating for an `n x n` grid
    pub fn initialize_tables(&mut self, grid_size: usize) -> Result<()> {
        self.store.initialize(grid_size)?;
        self.trajectory.clear();
        Ok(())
    }

    /// Choose an action at `position`, take it and learn from the transition
    ///
    /// An unrecognised algorithm returns `needs_stop` before the environment
    /// is consulted.
    pub fn learning_step<D>(&mut self, position: StateKey, grid_size: usize, dynamics: &D) -> StepResult
    where
        D: Dynamics + ?Sized,
    {
        let Some(algorithm) = self.config.algorithm.known() else {
            warn!(%position, "learning step requested with an unrecognised algorithm");
            increment_counter!("gridlearn_needs_stop_total");
            return StepResult::stopped(position);
        };

        let action = PolicyEngine::new(&mut self.store, &self.config, dynamics)
            .choose_action(position, &mut self.rng);
        let transition = dynamics.step(action, position, grid_size);
        self.store
            .record_transition(position, action, transition.next_state);

        let experience = Experience {
            state: position,
            action,
            reward: transition.reward,
            next_state: transition.next_state,
            done: transition.done,
        };
        let outcome = UpdateEngine::new(
            &mut self.store,
            &mut self.trajectory,
            &self.config,
            dynamics,
        )
        .apply(&experience, &mut self.rng);

        increment_counter!("gridlearn_learning_steps_total", "algorithm" => algorithm.as_str());
        debug!(
            %position,
            %action,
            next = %transition.next_state,
            reward = transition.reward,
            done = transition.done,
            ?outcome,
            "learning step"
        );

        StepResult {
            needs_stop: outcome == UpdateOutcome::NeedsStop,
            new_position: transition.new_position,
            reward: transition.reward,
            done: transition.done,
            action: Some(action),
        }
    }

    /// Flush the Monte Carlo trajectory into the Q-table
    ///
    /// Clears the buffer for every algorithm; only Monte Carlo ever fills it.
    pub fn apply_monte_carlo_updates(&mut self) -> usize {
        if self.config.algorithm.is(Algorithm::MonteCarlo) {
            apply_monte_carlo(&mut self.store, &mut self.trajectory, &self.config)
        } else {
            self.trajectory.clear();
            0
        }
    }

    /// Best actions in `state` under the current algorithm's value source
    pub fn best_actions<D: Dynamics + ?Sized>(&mut self, state: StateKey, dynamics: &D) -> Vec<Action> {
        PolicyEngine::new(&mut self.store, &self.config, dynamics).best_actions(state)
    }

    /// Sample an action for `state` without learning
    pub fn choose_action<D: Dynamics + ?Sized>(&mut self, state: StateKey, dynamics: &D) -> Action {
        PolicyEngine::new(&mut self.store, &self.config, dynamics)
            .choose_action(state, &mut self.rng)
    }

    /// Policy distribution in `state`
    pub fn action_probabilities<D: Dynamics + ?Sized>(
        &mut self,
        state: StateKey,
        dynamics: &D,
    ) -> ActionValues {
        PolicyEngine::new(&mut self.store, &self.config, dynamics).action_probabilities(state)
    }

    /// Per-action values for display in `state`
    ///
    /// Preferences for actor-critic, SR-derived Q-values for successor
    /// representation and the Q-table otherwise.
    pub fn display_q_values<D: Dynamics + ?Sized>(
        &mut self,
        state: StateKey,
        dynamics: &D,
    ) -> ActionValues {
        PolicyEngine::new(&mut self.store, &self.config, dynamics).action_values(state)
    }

    /// `V(s) = Σ M(s,s')·w(s')`
    #[must_use]
    pub fn sr_state_value(&self, state: StateKey) -> f64 {
        successor::state_value(&self.store, state)
    }

    /// Row `M(state, ·)` in [`StateKey::index`] order
    #[must_use]
    pub fn sr_occupancy(&self, state: StateKey) -> Option<ArrayView1<'_, f64>> {
        self.store.m_row(state)
    }

    /// Serializable copy of every table
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        self.store.snapshot()
    }

    /// Read access to the tables
    #[must_use]
    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Drop buffered Monte Carlo steps without learning from them
    pub fn clear_trajectory(&mut self) {
        self.trajectory.clear();
    }

    /// Buffered Monte Carlo steps of the current episode
    #[must_use]
    pub fn trajectory(&self) -> &TrajectoryBuffer {
        &self.trajectory
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Select the algorithm
    ///
    /// Tables are left as they are; callers pair this with
    /// [`Learner::initialize_tables`].
    pub fn set_algorithm(&mut self, algorithm: impl Into<AlgorithmSelection>) {
        self.config.algorithm = algorithm.into();
        info!(algorithm = %self.config.algorithm, "algorithm selected");
    }

    /// Select the algorithm by name, keeping unrecognised names
    pub fn set_algorithm_named(&mut self, name: &str) {
        self.set_algorithm(AlgorithmSelection::from_name(name));
    }

    /// Select the exploration strategy
    pub fn set_exploration(&mut self, strategy: impl Into<StrategySelection>) {
        self.config.exploration = strategy.into();
    }

    /// Select the exploration strategy by name, keeping unrecognised names
    pub fn set_exploration_named(&mut self, name: &str) {
        self.set_exploration(StrategySelection::from_name(name));
    }

    /// Set the base learning rate; per-purpose overrides stay in place
    pub fn set_learning_rate(&mut self, rate: f64) -> Result<()> {
        self.config.learning_rates.base = unit_interval("learning_rate", rate)?;
        Ok(())
    }

    /// Override the actor learning rate, or clear it with `None`
    pub fn set_actor_learning_rate(&mut self, rate: Option<f64>) -> Result<()> {
        self.config.learning_rates.actor = optional_unit("actor_learning_rate", rate)?;
        Ok(())
    }

    /// Override the critic learning rate, or clear it with `None`
    pub fn set_critic_learning_rate(&mut self, rate: Option<f64>) -> Result<()> {
        self.config.learning_rates.critic = optional_unit("critic_learning_rate", rate)?;
        Ok(())
    }

    /// Override the successor-matrix learning rate, or clear it with `None`
    pub fn set_sr_matrix_learning_rate(&mut self, rate: Option<f64>) -> Result<()> {
        self.config.learning_rates.sr_matrix = optional_unit("sr_matrix_learning_rate", rate)?;
        Ok(())
    }

    /// Override the reward-weight learning rate, or clear it with `None`
    pub fn set_sr_reward_learning_rate(&mut self, rate: Option<f64>) -> Result<()> {
        self.config.learning_rates.sr_reward = optional_unit("sr_reward_learning_rate", rate)?;
        Ok(())
    }

    /// Drop every per-purpose override
    pub fn clear_rate_overrides(&mut self) {
        self.config.learning_rates.clear_overrides();
    }

    /// Set γ
    pub fn set_discount_factor(&mut self, gamma: f64) -> Result<()> {
        self.config.discount_factor = unit_interval("discount_factor", gamma)?;
        Ok(())
    }

    /// Set ε
    pub fn set_exploration_rate(&mut self, epsilon: f64) -> Result<()> {
        self.config.exploration_rate = unit_interval("exploration_rate", epsilon)?;
        Ok(())
    }

    /// Set the softmax inverse temperature β
    pub fn set_softmax_beta(&mut self, beta: f64) -> Result<()> {
        if !beta.is_finite() || beta < 0.0 {
            return Err(LearnError::InvalidParameter {
                name: "softmax_beta",
                value: beta,
            });
        }
        self.config.softmax_beta = beta;
        Ok(())
    }

    /// Choose where SR Q-values look up the next state
    pub fn set_sr_lookahead(&mut self, lookahead: gridlearn_core::SrLookahead) {
        self.config.sr_lookahead = lookahead;
    }

    /// Whether the active strategy is `strategy`
    #[must_use]
    pub fn explores_with(&self, strategy: ExplorationStrategy) -> bool {
        self.config.exploration == StrategySelection::Known(strategy)
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(LearnError::InvalidParameter { name, value })
    }
}

fn optional_unit(name: &'static str, value: Option<f64>) -> Result<Option<f64>> {
    value.map(|v| unit_interval(name, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gridlearn_core::{RatePurpose, Transition};
    use std::cell::Cell;

    /// Moves right on a 1-row corridor; the last column is a terminal gem
    fn corridor(action: Action, position: StateKey, n: usize) -> Transition {
        let next = position.neighbour(action, n).unwrap_or(position);
        let done = next.x == n - 1;
        Transition {
            next_state: next,
            reward: if done { 1.0 } else { 0.0 },
            new_position: next,
            done,
        }
    }

    fn seeded(algorithm: Algorithm) -> Learner {
        let config = LearnerConfig {
            algorithm: algorithm.into(),
            seed: Some(7),
            ..LearnerConfig::default()
        };
        Learner::new(config, 3).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = LearnerConfig {
            discount_factor: 1.5,
            ..LearnerConfig::default()
        };
        assert!(matches!(
            Learner::new(config, 3),
            Err(LearnError::InvalidParameter { name: "discount_factor", .. })
        ));
    }

    #[test]
    fn test_learning_step_reports_transition() {
        let mut learner = seeded(Algorithm::QLearning);
        let result = learner.learning_step(StateKey::new(0, 0), 3, &corridor);

        assert!(!result.needs_stop);
        let action = result.action.unwrap();
        assert_eq!(result, StepResult {
            needs_stop: false,
            new_position: corridor(action, StateKey::new(0, 0), 3).new_position,
            reward: 0.0,
            done: false,
            action: Some(action),
        });
        assert_eq!(
            learner.store().observed_successor(StateKey::new(0, 0), action),
            Some(result.new_position)
        );
    }

    #[test]
    fn test_unknown_algorithm_stops_without_stepping() {
        let mut learner = seeded(Algorithm::QLearning);
        learner.set_algorithm_named("policy-iteration");
        let calls = Cell::new(0);
        let counting = |a: Action, p: StateKey, n: usize| {
            calls.set(calls.get() + 1);
            corridor(a, p, n)
        };

        let result = learner.learning_step(StateKey::new(0, 0), 3, &counting);

        assert!(result.needs_stop);
        assert_eq!(result.new_position, StateKey::new(0, 0));
        assert_eq!(result.action, None);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_monte_carlo_flush_only_at_episode_end() {
        let mut learner = seeded(Algorithm::MonteCarlo);
        learner.set_exploration(ExplorationStrategy::Greedy);
        let s = StateKey::new(1, 0);
        *learner.store.q_mut(s, Action::Right) = 0.5;

        let result = learner.learning_step(s, 3, &corridor);
        assert!(result.done);
        assert_eq!(learner.trajectory().len(), 1);
        assert_relative_eq!(learner.store().q(s, Action::Right), 0.5);

        assert_eq!(learner.apply_monte_carlo_updates(), 1);
        assert!(learner.trajectory().is_empty());
        assert_relative_eq!(learner.store().q(s, Action::Right), 0.5 + 0.1 * 0.5);
    }

    #[test]
    fn test_setting_base_rate_keeps_overrides() {
        let mut learner = seeded(Algorithm::ActorCritic);
        learner.set_actor_learning_rate(Some(0.3)).unwrap();
        learner.set_learning_rate(0.05).unwrap();

        let rates = learner.config().learning_rates;
        assert_relative_eq!(rates.resolve(RatePurpose::Actor), 0.3);
        assert_relative_eq!(rates.resolve(RatePurpose::Critic), 0.05);

        learner.clear_rate_overrides();
        assert_relative_eq!(learner.config().learning_rates.resolve(RatePurpose::Actor), 0.05);
    }

    #[test]
    fn test_setters_reject_out_of_range() {
        let mut learner = seeded(Algorithm::QLearning);
        assert!(learner.set_learning_rate(-0.1).is_err());
        assert!(learner.set_exploration_rate(1.1).is_err());
        assert!(learner.set_sr_matrix_learning_rate(Some(2.0)).is_err());
        assert!(learner.set_softmax_beta(f64::NAN).is_err());
        assert_relative_eq!(learner.config().exploration_rate, 0.2);
    }

    #[test]
    fn test_initialize_tables_clears_trajectory() {
        let mut learner = seeded(Algorithm::MonteCarlo);
        learner.learning_step(StateKey::new(0, 0), 3, &corridor);
        assert!(!learner.trajectory().is_empty());

        learner.initialize_tables(4).unwrap();

        assert!(learner.trajectory().is_empty());
        assert_eq!(learner.store().grid_size(), 4);
        assert_eq!(learner.sr_occupancy(StateKey::new(3, 3)).map(|r| r.len()), Some(16));
    }

    #[test]
    fn test_display_values_follow_algorithm() {
        let mut learner = seeded(Algorithm::ActorCritic);
        let s = StateKey::new(0, 0);
        learner.store.preferences_mut(s).left = 2.0;
        *learner.store.q_mut(s, Action::Up) = 5.0;

        assert_relative_eq!(learner.display_q_values(s, &corridor).left, 2.0);
        learner.set_algorithm(Algorithm::QLearning);
        assert_relative_eq!(learner.display_q_values(s, &corridor).up, 5.0);
        assert_eq!(learner.best_actions(s, &corridor), vec![Action::Up]);
    }
}

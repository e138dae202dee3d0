//! Action selection over the learned tables
//!
//! The value source depends on the algorithm: actor preferences for
//! actor-critic, successor-representation Q-values for SR and the Q-table
//! for everything else. Actor-critic always samples from the softmax over
//! its preferences; the other algorithms follow the configured exploration
//! strategy.

use rand::Rng;
use tracing::warn;

use gridlearn_core::{
    Action, ActionValues, Algorithm, AlgorithmSelection, Dynamics, ExplorationStrategy,
    LearnerConfig, StateKey, StrategySelection, TableStore,
};

use crate::successor;

/// Allowed deviation of a probability vector's sum from 1
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Boltzmann distribution `exp(β(v − max v)) / Σ exp(β(v' − max v))`
///
/// Falls back to uniform when the normaliser is zero or not finite.
#[must_use]
pub fn softmax(values: &ActionValues, beta: f64) -> ActionValues {
    let max = values.max();
    let exp = ActionValues::from_fn(|a| (beta * (values[a] - max)).exp());
    let sum = exp.sum();
    if sum == 0.0 || !sum.is_finite() {
        return ActionValues::uniform();
    }
    exp.scaled(1.0 / sum)
}

/// Inverse-CDF sample from a probability vector
///
/// Floating-point shortfall in the cumulative sum lands on the last action.
pub fn sample<R: Rng + ?Sized>(probabilities: &ActionValues, rng: &mut R) -> Action {
    let u: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (action, p) in probabilities.iter() {
        cumulative += p;
        if u < cumulative {
            return action;
        }
    }
    Action::ALL[Action::COUNT - 1]
}

/// Renormalise `probabilities` if their sum drifted beyond tolerance
///
/// A zero or non-finite sum cannot be rescaled and becomes uniform.
#[must_use]
pub fn normalized(probabilities: ActionValues, state: StateKey) -> ActionValues {
    let sum = probabilities.sum();
    if (sum - 1.0).abs() <= PROBABILITY_TOLERANCE {
        return probabilities;
    }
    warn!(%state, sum, "action probabilities do not sum to 1; normalising");
    if sum > 0.0 && sum.is_finite() {
        probabilities.scaled(1.0 / sum)
    } else {
        ActionValues::uniform()
    }
}

fn uniform_action<R: Rng + ?Sized>(rng: &mut R) -> Action {
    Action::ALL[rng.gen_range(0..Action::COUNT)]
}

fn pick<R: Rng + ?Sized>(actions: &[Action], rng: &mut R) -> Action {
    match actions.len() {
        0 => uniform_action(rng),
        n => actions[rng.gen_range(0..n)],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueSource {
    Preferences,
    Successor,
    ActionValues,
}

/// Policy view over a table store
///
/// Every query first makes sure the state has table entries, which is why
/// the store is borrowed mutably.
pub struct PolicyEngine<'a, D: ?Sized> {
    store: &'a mut TableStore,
    config: &'a LearnerConfig,
    dynamics: &'a D,
}

impl<'a, D> PolicyEngine<'a, D>
where
    D: Dynamics + ?Sized,
{
    /// Create a policy over `store` using the current configuration
    pub fn new(store: &'a mut TableStore, config: &'a LearnerConfig, dynamics: &'a D) -> Self {
        Self {
            store,
            config,
            dynamics,
        }
    }

    fn value_source(&self) -> ValueSource {
        match self.config.algorithm {
            AlgorithmSelection::Known(Algorithm::ActorCritic) => ValueSource::Preferences,
            AlgorithmSelection::Known(Algorithm::SuccessorRepresentation) => ValueSource::Successor,
            AlgorithmSelection::Known(
                Algorithm::QLearning
                | Algorithm::Sarsa
                | Algorithm::ExpectedSarsa
                | Algorithm::MonteCarlo,
            )
            | AlgorithmSelection::Unrecognized { .. } => ValueSource::ActionValues,
        }
    }

    /// Values the policy ranks actions by in `state`
    pub fn action_values(&mut self, state: StateKey) -> ActionValues {
        self.store.ensure_state(state);
        match self.value_source() {
            ValueSource::Preferences => self.store.preferences(state),
            ValueSource::Successor => successor::action_values(
                self.store,
                state,
                self.config.discount_factor,
                self.config.sr_lookahead,
                self.dynamics,
            ),
            ValueSource::ActionValues => self.store.q_values(state),
        }
    }

    /// Every action attaining the maximum value in `state`; never empty
    pub fn best_actions(&mut self, state: StateKey) -> Vec<Action> {
        self.action_values(state).argmax_set()
    }

    /// Sample an action for `state`
    pub fn choose_action<R: Rng + ?Sized>(&mut self, state: StateKey, rng: &mut R) -> Action {
        self.store.ensure_state(state);
        let config = self.config;
        let beta = config.softmax_beta;

        if self.value_source() == ValueSource::Preferences {
            let probabilities = softmax(&self.store.preferences(state), beta);
            return sample(&probabilities, rng);
        }

        match &config.exploration {
            StrategySelection::Known(ExplorationStrategy::EpsilonGreedy) => {
                if rng.gen::<f64>() < config.exploration_rate {
                    uniform_action(rng)
                } else {
                    let best = self.best_actions(state);
                    pick(&best, rng)
                }
            }
            StrategySelection::Known(ExplorationStrategy::Softmax) => {
                let probabilities = softmax(&self.action_values(state), beta);
                sample(&probabilities, rng)
            }
            StrategySelection::Known(ExplorationStrategy::Random) => uniform_action(rng),
            StrategySelection::Known(ExplorationStrategy::Greedy) => {
                let best = self.best_actions(state);
                pick(&best, rng)
            }
            StrategySelection::Unrecognized { requested } => {
                warn!(strategy = %requested, "unknown exploration strategy; choosing greedily");
                let best = self.best_actions(state);
                pick(&best, rng)
            }
        }
    }

    /// Probability of each action under the current policy in `state`
    ///
    /// Always sums to 1 within [`PROBABILITY_TOLERANCE`].
    pub fn action_probabilities(&mut self, state: StateKey) -> ActionValues {
        self.store.ensure_state(state);
        let config = self.config;
        let beta = config.softmax_beta;
        #[allow(clippy::cast_precision_loss)]
        let n = Action::COUNT as f64;

        let probabilities = if self.value_source() == ValueSource::Preferences {
            softmax(&self.store.preferences(state), beta)
        } else {
            match &config.exploration {
                StrategySelection::Known(ExplorationStrategy::EpsilonGreedy) => {
                    let epsilon = config.exploration_rate;
                    let best = self.best_actions(state);
                    #[allow(clippy::cast_precision_loss)]
                    let greedy_share = (1.0 - epsilon) / best.len() as f64;
                    ActionValues::from_fn(|a| {
                        let explore = epsilon / n;
                        if best.contains(&a) {
                            explore + greedy_share
                        } else {
                            explore
                        }
                    })
                }
                StrategySelection::Known(ExplorationStrategy::Softmax) => {
                    softmax(&self.action_values(state), beta)
                }
                StrategySelection::Known(ExplorationStrategy::Random) => ActionValues::uniform(),
                StrategySelection::Known(ExplorationStrategy::Greedy) => {
                    let best = self.best_actions(state);
                    #[allow(clippy::cast_precision_loss)]
                    let share = 1.0 / best.len() as f64;
                    ActionValues::from_fn(|a| if best.contains(&a) { share } else { 0.0 })
                }
                StrategySelection::Unrecognized { requested } => {
                    warn!(strategy = %requested, "unknown exploration strategy; reporting uniform probabilities");
                    ActionValues::uniform()
                }
            }
        };

        normalized(probabilities, state)
    }
}

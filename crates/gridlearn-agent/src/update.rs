//! Per-algorithm learning rules

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gridlearn_core::{
    Action, Algorithm, AlgorithmSelection, Dynamics, LearnerConfig, RatePurpose, StateKey,
    TableStore, TrajectoryBuffer,
};

use crate::policy::{softmax, PolicyEngine};

/// One observed transition `(s, a, r, s', done)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// State the action was taken in
    pub state: StateKey,
    /// Action taken
    pub action: Action,
    /// Reward received
    pub reward: f64,
    /// State reached
    pub next_state: StateKey,
    /// Whether the episode ended
    pub done: bool,
}

/// What an update did with an experience
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Tables were updated
    Applied,
    /// Stored in the trajectory buffer for the end of the episode
    Buffered,
    /// A required table entry was missing; nothing changed
    Skipped,
    /// No update rule exists for the configured algorithm
    NeedsStop,
}

/// Applies the configured algorithm's rule to the table store
pub struct UpdateEngine<'a, D: ?Sized> {
    store: &'a mut TableStore,
    trajectory: &'a mut TrajectoryBuffer,
    config: &'a LearnerConfig,
    dynamics: &'a D,
}

impl<'a, D> UpdateEngine<'a, D>
where
    D: Dynamics + ?Sized,
{
    /// Create an engine over the learner's tables and trajectory
    pub fn new(
        store: &'a mut TableStore,
        trajectory: &'a mut TrajectoryBuffer,
        config: &'a LearnerConfig,
        dynamics: &'a D,
    ) -> Self {
        Self {
            store,
            trajectory,
            config,
            dynamics,
        }
    }

    fn rate(&self, purpose: RatePurpose) -> f64 {
        self.config.learning_rates.resolve(purpose)
    }

    /// Dispatch `experience` to the configured algorithm
    ///
    /// SARSA draws its next action from `rng`.
    pub fn apply<R: Rng + ?Sized>(&mut self, experience: &Experience, rng: &mut R) -> UpdateOutcome {
        self.store.ensure_state(experience.state);
        self.store.ensure_state(experience.next_state);

        let algorithm = match &self.config.algorithm {
            AlgorithmSelection::Known(algorithm) => *algorithm,
            AlgorithmSelection::Unrecognized { requested } => {
                warn!(algorithm = %requested, "no update rule for algorithm");
                return UpdateOutcome::NeedsStop;
            }
        };

        match algorithm {
            Algorithm::QLearning => self.q_learning(experience),
            Algorithm::Sarsa => self.sarsa(experience, rng),
            Algorithm::ExpectedSarsa => self.expected_sarsa(experience),
            Algorithm::MonteCarlo => {
                self.trajectory
                    .push(experience.state, experience.action, experience.reward);
                UpdateOutcome::Buffered
            }
            Algorithm::ActorCritic => self.actor_critic(experience),
            Algorithm::SuccessorRepresentation => self.successor(experience),
        }
    }

    fn td_update(&mut self, experience: &Experience, next_value: f64) -> UpdateOutcome {
        let alpha = self.rate(RatePurpose::ActionValue);
        let target = experience.reward + self.config.discount_factor * next_value;
        let q = self.store.q_mut(experience.state, experience.action);
        *q += alpha * (target - *q);
        UpdateOutcome::Applied
    }

    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') − Q(s,a)]
    pub fn q_learning(&mut self, experience: &Experience) -> UpdateOutcome {
        let max_next = self.store.q_values(experience.next_state).max();
        self.td_update(experience, max_next)
    }

    /// Q(s,a) ← Q(s,a) + α[r + γ Q(s',a') − Q(s,a)], `a'` sampled from the policy
    pub fn sarsa<R: Rng + ?Sized>(&mut self, experience: &Experience, rng: &mut R) -> UpdateOutcome {
        let next_action = PolicyEngine::new(&mut *self.store, self.config, self.dynamics)
            .choose_action(experience.next_state, rng);
        let next_q = self.store.q(experience.next_state, next_action);
        self.td_update(experience, next_q)
    }

    /// Q(s,a) ← Q(s,a) + α[r + γ Σ π(a'|s') Q(s',a') − Q(s,a)]
    pub fn expected_sarsa(&mut self, experience: &Experience) -> UpdateOutcome {
        let probabilities = PolicyEngine::new(&mut *self.store, self.config, self.dynamics)
            .action_probabilities(experience.next_state);
        let q_next = self.store.q_values(experience.next_state);
        let expected: f64 = probabilities.iter().map(|(a, p)| p * q_next[a]).sum();
        self.td_update(experience, expected)
    }

    /// Critic TD step followed by a softmax policy-gradient step on the preferences
    pub fn actor_critic(&mut self, experience: &Experience) -> UpdateOutcome {
        let gamma = self.config.discount_factor;
        let alpha_critic = self.rate(RatePurpose::Critic);
        let alpha_actor = self.rate(RatePurpose::Actor);

        let v = self.store.v(experience.state);
        let v_next = if experience.done {
            0.0
        } else {
            self.store.v(experience.next_state)
        };
        let td_error = experience.reward + gamma * v_next - v;
        *self.store.v_mut(experience.state) = v + alpha_critic * td_error;

        let pi = softmax(
            &self.store.preferences(experience.state),
            self.config.softmax_beta,
        );
        let preferences = self.store.preferences_mut(experience.state);
        for action in Action::ALL {
            if action == experience.action {
                preferences[action] += alpha_actor * td_error * (1.0 - pi[action]);
            } else {
                preferences[action] -= alpha_actor * td_error * pi[action];
            }
        }
        UpdateOutcome::Applied
    }

    /// Reward-weight step on `w(s')` and a TD step on every entry of `M(s, ·)`
    ///
    /// Costs `O(n²)` per call.
    pub fn successor(&mut self, experience: &Experience) -> UpdateOutcome {
        let gamma = self.config.discount_factor;
        let alpha_w = self.rate(RatePurpose::SrReward);
        let alpha_m = self.rate(RatePurpose::SrMatrix);

        let grid_size = self.store.grid_size();
        if self.store.m_row(experience.state).is_none() {
            warn!(state = %experience.state, grid_size, "successor row missing; skipping update");
            return UpdateOutcome::Skipped;
        }

        let w = self.store.w_mut(experience.next_state);
        *w += alpha_w * (experience.reward - *w);

        let next_index = experience.next_state.index(grid_size);
        let next_row = if experience.done {
            None
        } else {
            self.store.m_row(experience.next_state).map(|row| row.to_owned())
        };
        let Some(mut row) = self.store.m_row_mut(experience.state) else {
            return UpdateOutcome::Skipped;
        };

        for (j, m) in row.iter_mut().enumerate() {
            let indicator = if next_index == Some(j) { 1.0 } else { 0.0 };
            let bootstrap = next_row.as_ref().map_or(0.0, |next| next[j]);
            *m += alpha_m * (indicator + gamma * bootstrap - *m);
        }
        UpdateOutcome::Applied
    }
}

/// Apply every-visit Monte Carlo updates for the buffered episode
///
/// Returns are accumulated backwards and each visit is updated in reverse
/// visitation order. The buffer is left empty. Returns the number of
/// updates applied.
pub fn apply_monte_carlo(
    store: &mut TableStore,
    trajectory: &mut TrajectoryBuffer,
    config: &LearnerConfig,
) -> usize {
    let alpha = config.learning_rates.resolve(RatePurpose::ActionValue);
    let mut applied = 0;
    for (entry, g) in trajectory.drain_with_returns(config.discount_factor) {
        let q = store.q_mut(entry.state, entry.action);
        *q += alpha * (g - *q);
        applied += 1;
    }
    debug!(applied, "monte carlo updates applied");
    applied
}

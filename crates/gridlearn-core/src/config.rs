//! Learner configuration
//!
//! Algorithm and exploration strategy are closed enums. Free-form names
//! only enter through [`AlgorithmSelection::from_name`] and
//! [`StrategySelection::from_name`], which keep an unrecognised name around
//! so the engines can apply their documented fallbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::{LearnError, Result};

/// Learning algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Off-policy TD control
    QLearning,
    /// On-policy TD control
    Sarsa,
    /// TD control on the expected next action value
    ExpectedSarsa,
    /// Every-visit Monte Carlo control
    MonteCarlo,
    /// Tabular actor-critic with softmax preferences
    ActorCritic,
    /// Successor representation with learned reward weights
    #[serde(rename = "sr")]
    SuccessorRepresentation,
}

impl Algorithm {
    /// Every algorithm
    pub const ALL: [Algorithm; 6] = [
        Algorithm::QLearning,
        Algorithm::Sarsa,
        Algorithm::ExpectedSarsa,
        Algorithm::MonteCarlo,
        Algorithm::ActorCritic,
        Algorithm::SuccessorRepresentation,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::QLearning => "q-learning",
            Algorithm::Sarsa => "sarsa",
            Algorithm::ExpectedSarsa => "expected-sarsa",
            Algorithm::MonteCarlo => "monte-carlo",
            Algorithm::ActorCritic => "actor-critic",
            Algorithm::SuccessorRepresentation => "sr",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = LearnError;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| LearnError::UnknownAlgorithm(s.to_string()))
    }
}

/// Exploration strategy used by value-based algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExplorationStrategy {
    /// Random action with probability ε, otherwise a best action
    EpsilonGreedy,
    /// Boltzmann distribution over action values
    Softmax,
    /// Uniform over all actions
    Random,
    /// Uniform over the best actions
    Greedy,
}

impl ExplorationStrategy {
    /// Every strategy
    pub const ALL: [ExplorationStrategy; 4] = [
        ExplorationStrategy::EpsilonGreedy,
        ExplorationStrategy::Softmax,
        ExplorationStrategy::Random,
        ExplorationStrategy::Greedy,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExplorationStrategy::EpsilonGreedy => "epsilon-greedy",
            ExplorationStrategy::Softmax => "softmax",
            ExplorationStrategy::Random => "random",
            ExplorationStrategy::Greedy => "greedy",
        }
    }
}

impl fmt::Display for ExplorationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExplorationStrategy {
    type Err = LearnError;

    fn from_str(s: &str) -> Result<Self> {
        ExplorationStrategy::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| LearnError::UnknownStrategy(s.to_string()))
    }
}

/// Configured algorithm, possibly an unrecognised name
///
/// An unrecognised algorithm still selects actions from the raw Q-table,
/// but the learner refuses to update and asks the caller to stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlgorithmSelection {
    /// A known algorithm
    Known(Algorithm),
    /// A name that did not parse
    Unrecognized {
        /// The name as supplied
        requested: String,
    },
}

impl AlgorithmSelection {
    /// Parse a name, keeping unknown names and logging them
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.parse::<Algorithm>() {
            Ok(algorithm) => Self::Known(algorithm),
            Err(err) => {
                warn!(%err, "unrecognised algorithm; learning steps will request a stop");
                Self::Unrecognized {
                    requested: name.to_string(),
                }
            }
        }
    }

    /// The algorithm, if recognised
    #[must_use]
    pub fn known(&self) -> Option<Algorithm> {
        match self {
            Self::Known(algorithm) => Some(*algorithm),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Whether this selects `algorithm`
    #[must_use]
    pub fn is(&self, algorithm: Algorithm) -> bool {
        self.known() == Some(algorithm)
    }
}

impl From<Algorithm> for AlgorithmSelection {
    fn from(algorithm: Algorithm) -> Self {
        Self::Known(algorithm)
    }
}

impl From<String> for AlgorithmSelection {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<AlgorithmSelection> for String {
    fn from(selection: AlgorithmSelection) -> Self {
        match selection {
            AlgorithmSelection::Known(algorithm) => algorithm.as_str().to_string(),
            AlgorithmSelection::Unrecognized { requested } => requested,
        }
    }
}

impl fmt::Display for AlgorithmSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(algorithm) => algorithm.fmt(f),
            Self::Unrecognized { requested } => write!(f, "{requested} (unrecognised)"),
        }
    }
}

/// Configured exploration strategy, possibly an unrecognised name
///
/// An unrecognised strategy selects greedily and reports a uniform
/// distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategySelection {
    /// A known strategy
    Known(ExplorationStrategy),
    /// A name that did not parse
    Unrecognized {
        /// The name as supplied
        requested: String,
    },
}

impl StrategySelection {
    /// Parse a name, keeping unknown names and logging them
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.parse::<ExplorationStrategy>() {
            Ok(strategy) => Self::Known(strategy),
            Err(err) => {
                warn!(%err, "unrecognised exploration strategy; falling back to greedy selection");
                Self::Unrecognized {
                    requested: name.to_string(),
                }
            }
        }
    }
}

impl From<ExplorationStrategy> for StrategySelection {
    fn from(strategy: ExplorationStrategy) -> Self {
        Self::Known(strategy)
    }
}

impl From<String> for StrategySelection {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<StrategySelection> for String {
    fn from(selection: StrategySelection) -> Self {
        match selection {
            StrategySelection::Known(strategy) => strategy.as_str().to_string(),
            StrategySelection::Unrecognized { requested } => requested,
        }
    }
}

/// What a learning rate is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePurpose {
    /// Q-table updates (TD methods and Monte Carlo)
    ActionValue,
    /// Actor preference updates
    Actor,
    /// Critic state-value updates
    Critic,
    /// Successor matrix updates
    SrMatrix,
    /// Reward weight updates
    SrReward,
}

/// Base learning rate plus optional per-purpose overrides
///
/// Overrides are resolved when read, so changing the base rate moves every
/// purpose that has no override of its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningRates {
    /// Rate used wherever no override applies
    pub base: f64,
    /// Actor override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<f64>,
    /// Critic override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic: Option<f64>,
    /// Successor matrix override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sr_matrix: Option<f64>,
    /// Reward weight override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sr_reward: Option<f64>,
}

impl LearningRates {
    /// Rates with only a base value
    #[must_use]
    pub fn uniform(base: f64) -> Self {
        Self {
            base,
            actor: None,
            critic: None,
            sr_matrix: None,
            sr_reward: None,
        }
    }

    /// Effective rate for `purpose`
    #[must_use]
    pub fn resolve(&self, purpose: RatePurpose) -> f64 {
        let specific = match purpose {
            RatePurpose::ActionValue => None,
            RatePurpose::Actor => self.actor,
            RatePurpose::Critic => self.critic,
            RatePurpose::SrMatrix => self.sr_matrix,
            RatePurpose::SrReward => self.sr_reward,
        };
        specific.unwrap_or(self.base)
    }

    /// Drop every override so all purposes follow the base rate again
    pub fn clear_overrides(&mut self) {
        *self = Self::uniform(self.base);
    }

    fn all(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("learning_rate", Some(self.base)),
            ("actor_learning_rate", self.actor),
            ("critic_learning_rate", self.critic),
            ("sr_matrix_learning_rate", self.sr_matrix),
            ("sr_reward_learning_rate", self.sr_reward),
        ]
        .into_iter()
        .filter_map(|(name, rate)| rate.map(|r| (name, r)))
    }
}

impl Default for LearningRates {
    fn default() -> Self {
        Self::uniform(0.1)
    }
}

/// Where the successor-representation Q-value finds the next state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SrLookahead {
    /// Ask the environment's step function
    #[default]
    Environment,
    /// Use the successor last observed for the state-action pair
    LearnedModel,
}

/// Configuration for the learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Active algorithm
    pub algorithm: AlgorithmSelection,
    /// Exploration strategy for value-based algorithms
    pub exploration: StrategySelection,
    /// Learning rates
    pub learning_rates: LearningRates,
    /// Discount factor γ
    pub discount_factor: f64,
    /// Exploration rate ε
    pub exploration_rate: f64,
    /// Softmax inverse temperature β
    pub softmax_beta: f64,
    /// Next-state source for successor-representation Q-values
    pub sr_lookahead: SrLookahead,
    /// Random seed
    pub seed: Option<u64>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmSelection::Known(Algorithm::QLearning),
            exploration: StrategySelection::Known(ExplorationStrategy::EpsilonGreedy),
            learning_rates: LearningRates::default(),
            discount_factor: 0.9,
            exploration_rate: 0.2,
            softmax_beta: 1.0,
            sr_lookahead: SrLookahead::Environment,
            seed: None,
        }
    }
}

impl LearnerConfig {
    /// Parse a JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every numeric parameter is in range
    ///
    /// Rates, γ and ε must lie in `[0, 1]`; β must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        let unit = self
            .learning_rates
            .all()
            .chain([
                ("discount_factor", self.discount_factor),
                ("exploration_rate", self.exploration_rate),
            ]);
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(LearnError::InvalidParameter { name, value });
            }
        }
        if !self.softmax_beta.is_finite() || self.softmax_beta < 0.0 {
            return Err(LearnError::InvalidParameter {
                name: "softmax_beta",
                value: self.softmax_beta,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_rate_overrides_from_json() {
        let config = LearnerConfig::from_json(r#"{"learning_rates": {"actor": 0.2}}"#).unwrap();
        assert_eq!(config.learning_rates.base, 0.1);
        assert_eq!(config.learning_rates.resolve(RatePurpose::Actor), 0.2);
        assert_eq!(config.learning_rates.resolve(RatePurpose::Critic), 0.1);
    }

    #[test]
    fn test_names_match_wire_format() {
        for algorithm in Algorithm::ALL {
            let json = serde_json::to_string(&algorithm).unwrap();
            assert_eq!(json, format!("\"{}\"", algorithm.as_str()));
            assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
        }
        for strategy in ExplorationStrategy::ALL {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy.as_str()));
        }
    }

    #[test]
    fn test_unknown_names_are_kept() {
        let selection = AlgorithmSelection::from_name("td-lambda");
        assert_eq!(
            selection,
            AlgorithmSelection::Unrecognized {
                requested: "td-lambda".to_string()
            }
        );
        assert_eq!(selection.known(), None);

        let strategy = StrategySelection::from_name("ucb");
        assert!(matches!(strategy, StrategySelection::Unrecognized { .. }));
    }

    #[test]
    fn test_overrides_resolve_at_read_time() {
        let mut rates = LearningRates::uniform(0.1);
        rates.actor = Some(0.05);
        assert_eq!(rates.resolve(RatePurpose::Actor), 0.05);
        assert_eq!(rates.resolve(RatePurpose::Critic), 0.1);

        rates.base = 0.3;
        assert_eq!(rates.resolve(RatePurpose::Actor), 0.05);
        assert_eq!(rates.resolve(RatePurpose::Critic), 0.3);
        assert_eq!(rates.resolve(RatePurpose::SrMatrix), 0.3);

        rates.clear_overrides();
        assert_eq!(rates.resolve(RatePurpose::Actor), 0.3);
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = LearnerConfig::from_json(
            r#"{"algorithm": "actor-critic", "exploration": "softmax", "softmax_beta": 2.5}"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, AlgorithmSelection::Known(Algorithm::ActorCritic));
        assert_eq!(
            config.exploration,
            StrategySelection::Known(ExplorationStrategy::Softmax)
        );
        assert_eq!(config.softmax_beta, 2.5);
        assert_eq!(config.discount_factor, 0.9);
    }

    #[test]
    fn test_json_keeps_unknown_algorithm() {
        let config = LearnerConfig::from_json(r#"{"algorithm": "dyna-q"}"#).unwrap();
        let json = config.to_json().unwrap();
        assert!(json.contains("\"dyna-q\""));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = LearnerConfig::default();
        config.exploration_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(LearnError::InvalidParameter { name: "exploration_rate", .. })
        ));

        let mut config = LearnerConfig::default();
        config.learning_rates.critic = Some(-0.1);
        assert!(config.validate().is_err());

        let mut config = LearnerConfig::default();
        config.softmax_beta = f64::INFINITY;
        assert!(config.validate().is_err());
    }
}

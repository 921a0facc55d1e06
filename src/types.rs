//! Common Types and Constants
//!
//! Shared data structures used across the learner, the trial loop and the
//! scoring drivers.

use serde::{Deserialize, Serialize};

use crate::error::RsslError;

// ==================== Constants ====================

/// Lower buffer for reward normalization (covers subjective costs)
pub const LOWER_LIMIT: f64 = -250.0;

/// Upper buffer for reward normalization
pub const UPPER_LIMIT: f64 = 250.0;

/// Error tolerance for marginal likelihood quadrature
pub const PRECISION_EPSILON: f64 = 1e-4;

/// Tolerance when checking that marginal likelihoods sum to one
pub const LIKELIHOOD_SUM_TOLERANCE: f64 = 1e-3;

/// The click that ends planning and executes the best path
pub const TERMINATE: Action = 0;

// ==================== Identifiers ====================

/// Identifier of a planning strategy in the strategy catalog (1-based in the
/// published catalogs)
pub type StrategyId = u32;

/// A click on a node of the planning tree. `0` terminates planning.
pub type Action = usize;

/// Per-strategy feature weights, keyed by strategy id
pub type StrategyWeights = std::collections::BTreeMap<StrategyId, Vec<f64>>;

/// Clip a reward into the normalization buffer `[LOWER_LIMIT, UPPER_LIMIT]`.
///
/// The Bernoulli update rejects rewards outside the buffer; callers that would
/// rather saturate can clip first.
pub fn clip_reward(reward: f64) -> f64 {
    reward.clamp(LOWER_LIMIT, UPPER_LIMIT)
}

/// Seed used when a config leaves the seed unset: the system clock in nanoseconds
pub fn default_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

// ==================== Observed Data ====================

/// One trial of a participant's observed behaviour
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservedTrial {
    /// Strategy the participant was classified as using
    pub strategy: StrategyId,
    /// Click sequence, ending with the termination action
    pub clicks: Vec<Action>,
    /// Rewards received for each click
    pub rewards: Vec<f64>,
}

/// A participant's parsed trial-by-trial data
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedTrajectory {
    pub trials: Vec<ObservedTrial>,
}

impl ObservedTrajectory {
    pub fn new(trials: Vec<ObservedTrial>) -> Self {
        Self { trials }
    }

    /// Observed record for a trial index
    pub fn trial(&self, index: usize) -> Result<&ObservedTrial, RsslError> {
        self.trials
            .get(index)
            .ok_or(RsslError::MissingObservedTrial(index))
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

/// Participant metadata used when scoring their data
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub pid: Option<u32>,
    /// Softmax temperature of the action-likelihood model
    pub temperature: Option<f64>,
}

impl Participant {
    /// Temperature, defaulting to 1 when the participant has none
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(1.0)
    }
}

// ==================== Simulation Output ====================

/// Outcome of one trial of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Trial index within the run
    pub trial: usize,
    /// Chosen (or observed) strategy id
    pub strategy: StrategyId,
    /// Clicks taken
    pub actions: Vec<Action>,
    /// Environment reward per click
    pub rewards: Vec<f64>,
    /// Scaled feedback delay per click (empty in likelihood mode)
    pub delays: Vec<f64>,
    /// Pseudo-reward per click (empty in likelihood mode)
    pub pseudo_rewards: Vec<f64>,
    /// Sum of the click rewards
    pub reward: f64,
    /// Reward the priors were updated with
    pub update_reward: f64,
    /// Feature weights of the chosen strategy
    pub weights: Vec<f64>,
    /// Log-likelihood contribution (likelihood mode only)
    pub log_likelihood: Option<f64>,
    /// Path executed on termination, when the environment reports one
    pub taken_path: Option<Vec<usize>>,
}

/// Trajectory record of a full run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub trials: Vec<TrialRecord>,
    /// Total negative log-likelihood, `None` unless the run scored data
    pub loss: Option<f64>,
}

impl SimulationOutput {
    pub fn rewards(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.reward).collect()
    }

    pub fn strategies(&self) -> Vec<StrategyId> {
        self.trials.iter().map(|t| t.strategy).collect()
    }

    pub fn actions(&self) -> Vec<Vec<Action>> {
        self.trials.iter().map(|t| t.actions.clone()).collect()
    }

    pub fn weights(&self) -> Vec<Vec<f64>> {
        self.trials.iter().map(|t| t.weights.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seed_varies_with_clock() {
        let first = default_seed();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_ne!(first, default_seed());
    }

    #[test]
    fn test_clip_reward() {
        assert_eq!(clip_reward(300.0), UPPER_LIMIT);
        assert_eq!(clip_reward(-300.0), LOWER_LIMIT);
        assert_eq!(clip_reward(12.5), 12.5);
    }

    #[test]
    fn test_participant_default_temperature() {
        assert_eq!(Participant::default().temperature(), 1.0);
        let p = Participant {
            pid: Some(4),
            temperature: Some(0.25),
        };
        assert_eq!(p.temperature(), 0.25);
    }

    #[test]
    fn test_missing_observed_trial() {
        let observed = ObservedTrajectory::new(vec![ObservedTrial {
            strategy: 1,
            clicks: vec![0],
            rewards: vec![5.0],
        }]);
        assert!(observed.trial(0).is_ok());
        assert!(matches!(
            observed.trial(1),
            Err(RsslError::MissingObservedTrial(1))
        ));
    }
}

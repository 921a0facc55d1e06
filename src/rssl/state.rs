//! Learner state persistence
//!
//! Captures the prior vector and the metadata needed to resume it. Restoring
//! into a learner of a different family, strategy space or null flag is
//! refused.

use serde::{Deserialize, Serialize};

use super::RsslLearner;
use crate::error::RsslError;
use crate::posterior::{PriorFamily, PriorVector};
use crate::types::StrategyId;

pub const STATE_VERSION: &str = "1.0.0";

/// Serializable learner state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnerState {
    pub version: String,
    pub family: PriorFamily,
    pub strategy_space: Vec<StrategyId>,
    pub priors: PriorVector,
    pub is_null: bool,
    pub stochastic_updating: bool,
    /// Observation variance in natural space
    pub gaussian_var: f64,
    pub update_count: u64,
}

impl LearnerState {
    pub fn to_json(&self) -> Result<String, RsslError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RsslError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl RsslLearner {
    pub fn get_state(&self) -> LearnerState {
        LearnerState {
            version: STATE_VERSION.to_string(),
            family: self.posterior.family(),
            strategy_space: self.strategy_space.clone(),
            priors: self.posterior.priors().clone(),
            is_null: self.is_null,
            stochastic_updating: self.stochastic_updating,
            gaussian_var: self.gaussian_var,
            update_count: self.update_count,
        }
    }

    /// Resume from a saved state
    pub fn set_state(&mut self, state: LearnerState) -> Result<(), RsslError> {
        if state.version != STATE_VERSION {
            return Err(RsslError::StateMismatch(format!(
                "unsupported state version {}",
                state.version
            )));
        }
        if state.family != self.posterior.family() {
            return Err(RsslError::StateMismatch(format!(
                "state holds {:?} priors, learner is {:?}",
                state.family,
                self.posterior.family()
            )));
        }
        if state.strategy_space != self.strategy_space {
            return Err(RsslError::StateMismatch(format!(
                "strategy space {:?} differs from {:?}",
                state.strategy_space, self.strategy_space
            )));
        }
        if state.is_null != self.is_null {
            return Err(RsslError::StateMismatch(
                "null-model flag differs".to_string(),
            ));
        }
        if state.family == PriorFamily::Gaussian
            && state.gaussian_var.to_bits() != self.gaussian_var.to_bits()
        {
            return Err(RsslError::StateMismatch(format!(
                "observation variance {} differs from {}",
                state.gaussian_var, self.gaussian_var
            )));
        }

        self.posterior.set_priors(state.priors)?;
        self.update_count = state.update_count;
        Ok(())
    }
}

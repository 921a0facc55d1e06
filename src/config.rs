//! Learner configuration
//!
//! Loaded from JSON or built in code. Defaults follow the published RSSL
//! fits: deterministic (soft) Bernoulli updates, unit observation variance,
//! no pseudo-rewards.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RsslError;
use crate::posterior::{PriorFamily, PriorVector};
use crate::quadrature::QuadratureOptions;
use crate::types::{StrategyId, StrategyWeights};

/// The four named RSSL model variants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    BernoulliRssl,
    GaussianRssl,
    NullBernoulliRssl,
    NullGaussianRssl,
}

impl ModelKind {
    pub fn is_gaussian(self) -> bool {
        matches!(self, Self::GaussianRssl | Self::NullGaussianRssl)
    }

    pub fn is_null(self) -> bool {
        matches!(self, Self::NullBernoulliRssl | Self::NullGaussianRssl)
    }

    pub fn family(self) -> PriorFamily {
        if self.is_gaussian() {
            PriorFamily::Gaussian
        } else {
            PriorFamily::Bernoulli
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Initial sufficient statistics, `2 * strategy_space.len()` entries
    pub priors: PriorVector,
    /// Ordered strategy ids; strategy index `i` is `strategy_space[i]`
    pub strategy_space: Vec<StrategyId>,
    pub is_gaussian: bool,
    /// Binarize Bernoulli updates by sampling
    pub stochastic_updating: bool,
    /// Observation variance of the Gaussian model
    pub gaussian_var: f64,
    /// Cost charged per click beyond the first
    pub subjective_cost: f64,
    /// Multiplier on environment feedback delays
    pub delay_scale: f64,
    /// Multiplier on pseudo-rewards, 0 disables them
    pub pr_weight: f64,
    /// Freeze the priors
    pub is_null: bool,
    /// Feature weights per strategy, reported per trial and handed to the scorer
    pub strategy_weights: StrategyWeights,
    pub seed: Option<u64>,
    pub quadrature: QuadratureOptions,
    /// Gaussian priors and `gaussian_var` are given as logarithms
    pub log_params: bool,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            priors: PriorVector::default(),
            strategy_space: Vec::new(),
            is_gaussian: false,
            stochastic_updating: false,
            gaussian_var: 1.0,
            subjective_cost: 0.0,
            delay_scale: 1.0,
            pr_weight: 0.0,
            is_null: false,
            strategy_weights: StrategyWeights::new(),
            seed: None,
            quadrature: QuadratureOptions::default(),
            log_params: false,
        }
    }
}

impl LearnerConfig {
    pub fn new(kind: ModelKind, strategy_space: Vec<StrategyId>, priors: PriorVector) -> Self {
        Self {
            priors,
            strategy_space,
            is_gaussian: kind.is_gaussian(),
            is_null: kind.is_null(),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn model_kind(&self) -> ModelKind {
        match (self.is_gaussian, self.is_null) {
            (false, false) => ModelKind::BernoulliRssl,
            (true, false) => ModelKind::GaussianRssl,
            (false, true) => ModelKind::NullBernoulliRssl,
            (true, true) => ModelKind::NullGaussianRssl,
        }
    }

    pub fn family(&self) -> PriorFamily {
        self.model_kind().family()
    }

    pub fn num_strategies(&self) -> usize {
        self.strategy_space.len()
    }

    pub fn from_json_str(json: &str) -> Result<Self, RsslError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RsslError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Priors and observation variance in natural space
    pub fn resolved_params(&self) -> (PriorVector, f64) {
        if self.log_params && self.is_gaussian {
            (
                PriorVector::from_log_space(self.priors.as_slice()),
                self.gaussian_var.exp(),
            )
        } else {
            (self.priors.clone(), self.gaussian_var)
        }
    }

    /// Structural checks that do not depend on the prior family's value ranges
    pub fn validate(&self) -> Result<(), RsslError> {
        if self.strategy_space.is_empty() {
            return Err(RsslError::EmptyStrategySpace);
        }
        let mut seen = BTreeSet::new();
        for &id in &self.strategy_space {
            if !seen.insert(id) {
                return Err(RsslError::DuplicateStrategy(id));
            }
        }
        if self.priors.len() != 2 * self.num_strategies() {
            return Err(RsslError::PriorLengthMismatch {
                expected: 2 * self.num_strategies(),
                actual: self.priors.len(),
            });
        }
        if !self.strategy_weights.is_empty() {
            if let Some(&missing) = self
                .strategy_space
                .iter()
                .find(|id| !self.strategy_weights.contains_key(id))
            {
                return Err(RsslError::MissingStrategyWeights(missing));
            }
        }
        Ok(())
    }
}

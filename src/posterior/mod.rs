//! Strategy posteriors
//!
//! Each strategy's latent value has an independent conjugate posterior, and
//! the sufficient statistics of all of them live in one flat [`PriorVector`]:
//!
//! - Bernoulli: `[0, n)` success pseudo-counts, `[n, 2n)` failure pseudo-counts.
//!   Strategy `i` is `Beta(prior[i] + 1, prior[i + n] + 1)`.
//! - Gaussian: `[0, n)` posterior means, `[n, 2n)` posterior variances.
//!
//! The two families implement [`StrategyPosterior`]; the learner picks one at
//! construction and never branches on the family afterwards.
//!
//! Operations:
//! - `choose`: Thompson sampling, one draw per strategy, argmax (first index wins ties)
//! - `update`: conjugate update of the chosen strategy's statistics
//! - `max_likelihoods`: probability that each strategy's latent value is the
//!   maximum, `∫ f_i(x) ∏_{j≠i} F_j(x) dx`, by adaptive quadrature

mod bernoulli;
mod gaussian;

pub use bernoulli::BernoulliPosterior;
pub use gaussian::GaussianPosterior;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::RsslError;
use crate::quadrature::{integrate_with_breakpoints, IntegrationCache, QuadratureOptions};
use crate::special::Marginal;
use crate::types::LIKELIHOOD_SUM_TOLERANCE;

// ==================== Prior Vector ====================

/// Flat sufficient statistics, `2 * num_strategies` entries
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorVector(Vec<f64>);

impl PriorVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// All-zero statistics for `num_strategies` strategies
    pub fn zeros(num_strategies: usize) -> Self {
        Self(vec![0.0; 2 * num_strategies])
    }

    /// Build from log-space parameters by exponentiating every entry
    pub fn from_log_space(values: &[f64]) -> Self {
        Self(values.iter().map(|v| v.exp()).collect())
    }

    pub fn num_strategies(&self) -> usize {
        self.0.len() / 2
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// First-half statistics (successes or means)
    pub fn first(&self) -> &[f64] {
        &self.0[..self.num_strategies()]
    }

    /// Second-half statistics (failures or variances)
    pub fn second(&self) -> &[f64] {
        &self.0[self.num_strategies()..]
    }

    /// Mutable pair of statistics for one strategy
    pub(crate) fn pair_mut(&mut self, index: usize) -> (&mut f64, &mut f64) {
        let n = self.num_strategies();
        let (first, second) = self.0.split_at_mut(n);
        (&mut first[index], &mut second[index])
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Check shape and per-family value constraints
    pub fn validate(&self, num_strategies: usize, family: PriorFamily) -> Result<(), RsslError> {
        if self.0.len() != 2 * num_strategies {
            return Err(RsslError::PriorLengthMismatch {
                expected: 2 * num_strategies,
                actual: self.0.len(),
            });
        }
        for (index, &value) in self.0.iter().enumerate() {
            if !value.is_finite() {
                return Err(RsslError::InvalidPrior {
                    index,
                    value,
                    reason: "not finite",
                });
            }
            match family {
                PriorFamily::Bernoulli if value < 0.0 => {
                    return Err(RsslError::InvalidPrior {
                        index,
                        value,
                        reason: "pseudo-counts must be non-negative",
                    });
                }
                PriorFamily::Gaussian if index >= num_strategies && value <= 0.0 => {
                    return Err(RsslError::InvalidPrior {
                        index,
                        value,
                        reason: "variances must be positive",
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl From<Vec<f64>> for PriorVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Which conjugate family the prior vector encodes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorFamily {
    Bernoulli,
    Gaussian,
}

// ==================== Posterior Interface ====================

/// A per-strategy posterior family over a prior vector it owns
pub trait StrategyPosterior: Send {
    fn family(&self) -> PriorFamily;

    fn priors(&self) -> &PriorVector;

    /// Replace the statistics wholesale (state restore)
    fn set_priors(&mut self, priors: PriorVector) -> Result<(), RsslError>;

    /// Thompson-sample a strategy index in `[0, num_strategies)`
    fn choose(&self, rng: &mut ChaCha8Rng) -> Result<usize, RsslError>;

    /// Conjugate update of strategy `index` after observing `reward`
    fn update(&mut self, reward: f64, index: usize, rng: &mut ChaCha8Rng)
        -> Result<(), RsslError>;

    /// Latent-value distribution of every strategy
    fn marginals(&self) -> Vec<Marginal>;

    /// Integration support covering every strategy's latent distribution
    fn support(&self) -> (f64, f64);

    fn num_strategies(&self) -> usize {
        self.priors().num_strategies()
    }

    /// Probability that each strategy's latent value is the largest
    fn max_likelihoods(
        &self,
        cache: &mut IntegrationCache,
        options: &QuadratureOptions,
    ) -> Result<Vec<f64>, RsslError> {
        max_likelihoods(&self.marginals(), self.support(), cache, options)
    }
}

/// Offsets, in standard deviations, at which every marginal gets a segment edge
const BREAKPOINT_SIGMAS: [f64; 9] = [-5.0, -3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 5.0];

/// Segment edges around each marginal's bulk, so no peak or cdf step hides
/// between the nodes of a coarse grid
fn breakpoints(marginals: &[Marginal]) -> Vec<f64> {
    marginals
        .iter()
        .flat_map(|m| {
            let (mean, std_dev) = (m.mean(), m.std_dev());
            BREAKPOINT_SIGMAS.iter().map(move |k| mean + k * std_dev)
        })
        .collect()
}

/// Argmax with first-index-wins ties
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// `P(strategy i is max) = ∫ f_i(x) ∏_{j≠i} F_j(x) dx` for every i
pub fn max_likelihoods(
    marginals: &[Marginal],
    (lower, upper): (f64, f64),
    cache: &mut IntegrationCache,
    options: &QuadratureOptions,
) -> Result<Vec<f64>, RsslError> {
    let mut likelihoods = Vec::with_capacity(marginals.len());
    let edges = breakpoints(marginals);

    for (i, target) in marginals.iter().enumerate() {
        let integrand = |x: f64| {
            let mut log_value = cache.log_pdf(target, x);
            for (j, other) in marginals.iter().enumerate() {
                if j == i || log_value == f64::NEG_INFINITY {
                    continue;
                }
                log_value += cache.log_cdf(other, x);
            }
            log_value.exp()
        };

        let integral = integrate_with_breakpoints(integrand, lower, upper, &edges, options).map_err(|source| {
            RsslError::Quadrature {
                strategy_index: i,
                source,
            }
        })?;

        let value = integral.value;
        if !(-options.tolerance..=1.0 + options.tolerance).contains(&value) {
            return Err(RsslError::ProbabilityOutOfRange {
                strategy_index: i,
                value,
            });
        }
        likelihoods.push(value.clamp(0.0, 1.0));
    }

    let total: f64 = likelihoods.iter().sum();
    if (total - 1.0).abs() > LIKELIHOOD_SUM_TOLERANCE {
        tracing::warn!(
            total,
            num_strategies = marginals.len(),
            "marginal likelihoods do not sum to one"
        );
        return Err(RsslError::LikelihoodSumDrift {
            total,
            tolerance: LIKELIHOOD_SUM_TOLERANCE,
        });
    }

    Ok(likelihoods)
}

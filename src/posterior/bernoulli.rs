use rand::distributions::{Bernoulli, Distribution};
use rand_chacha::ChaCha8Rng;
use rand_distr::Beta;

use super::{argmax, PriorFamily, PriorVector, StrategyPosterior};
use crate::error::RsslError;
use crate::special::Marginal;
use crate::types::{LOWER_LIMIT, UPPER_LIMIT};

/// Beta-Bernoulli posteriors over normalized rewards
#[derive(Clone, Debug)]
pub struct BernoulliPosterior {
    priors: PriorVector,
    /// Binarize each update by a Bernoulli draw instead of adding the expectation
    stochastic_updating: bool,
}

impl BernoulliPosterior {
    pub fn new(priors: PriorVector, stochastic_updating: bool) -> Result<Self, RsslError> {
        priors.validate(priors.num_strategies(), PriorFamily::Bernoulli)?;
        Ok(Self {
            priors,
            stochastic_updating,
        })
    }

    /// Map a reward into `[0, 1]` using the fixed normalization buffer
    pub fn normalize_reward(reward: f64) -> Result<f64, RsslError> {
        if !(LOWER_LIMIT..=UPPER_LIMIT).contains(&reward) {
            return Err(RsslError::RewardOutOfRange {
                reward,
                lower: LOWER_LIMIT,
                upper: UPPER_LIMIT,
            });
        }
        Ok((reward - LOWER_LIMIT) / (UPPER_LIMIT - LOWER_LIMIT))
    }

    fn beta_params(&self, index: usize) -> (f64, f64) {
        (
            self.priors.first()[index] + 1.0,
            self.priors.second()[index] + 1.0,
        )
    }
}

impl StrategyPosterior for BernoulliPosterior {
    fn family(&self) -> PriorFamily {
        PriorFamily::Bernoulli
    }

    fn priors(&self) -> &PriorVector {
        &self.priors
    }

    fn set_priors(&mut self, priors: PriorVector) -> Result<(), RsslError> {
        priors.validate(self.num_strategies(), PriorFamily::Bernoulli)?;
        self.priors = priors;
        Ok(())
    }

    fn choose(&self, rng: &mut ChaCha8Rng) -> Result<usize, RsslError> {
        let mut values = Vec::with_capacity(self.num_strategies());
        for index in 0..self.num_strategies() {
            let (alpha, beta) = self.beta_params(index);
            let dist = Beta::new(alpha, beta).map_err(|_| RsslError::InvalidPrior {
                index,
                value: alpha.min(beta) - 1.0,
                reason: "Beta shape parameters must be positive",
            })?;
            values.push(dist.sample(rng));
        }
        Ok(argmax(&values))
    }

    fn update(
        &mut self,
        reward: f64,
        index: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), RsslError> {
        let p = Self::normalize_reward(reward)?;
        let stochastic = self.stochastic_updating;
        let (successes, failures) = self.priors.pair_mut(index);

        if stochastic {
            let outcome = Bernoulli::new(p)
                .map_err(|_| RsslError::ProbabilityOutOfRange {
                    strategy_index: index,
                    value: p,
                })?
                .sample(rng);
            if outcome {
                *successes += 1.0;
            } else {
                *failures += 1.0;
            }
        } else {
            *successes += p;
            *failures += 1.0 - p;
        }
        Ok(())
    }

    fn marginals(&self) -> Vec<Marginal> {
        (0..self.num_strategies())
            .map(|index| {
                let (alpha, beta) = self.beta_params(index);
                Marginal::Beta { alpha, beta }
            })
            .collect()
    }

    fn support(&self) -> (f64, f64) {
        (0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadrature::{IntegrationCache, QuadratureOptions};
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_normalize_reward_bounds() {
        assert_eq!(BernoulliPosterior::normalize_reward(UPPER_LIMIT).unwrap(), 1.0);
        assert_eq!(BernoulliPosterior::normalize_reward(LOWER_LIMIT).unwrap(), 0.0);
        assert_eq!(BernoulliPosterior::normalize_reward(0.0).unwrap(), 0.5);
        assert!(BernoulliPosterior::normalize_reward(250.5).is_err());
    }

    #[test]
    fn test_soft_update_at_limits() {
        let mut posterior = BernoulliPosterior::new(PriorVector::zeros(2), false).unwrap();
        let mut rng = rng();

        posterior.update(UPPER_LIMIT, 0, &mut rng).unwrap();
        assert_eq!(posterior.priors().as_slice(), &[1.0, 0.0, 0.0, 0.0]);

        posterior.update(LOWER_LIMIT, 1, &mut rng).unwrap();
        assert_eq!(posterior.priors().as_slice(), &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_soft_update_fractional() {
        let mut posterior = BernoulliPosterior::new(PriorVector::zeros(2), false).unwrap();
        // p = (150 + 250) / 500 = 0.8
        posterior.update(150.0, 0, &mut rng()).unwrap();
        let priors = posterior.priors().as_slice();
        assert!((priors[0] - 0.8).abs() < 1e-12);
        assert_eq!(priors[1], 0.0);
        assert!((priors[2] - 0.2).abs() < 1e-12);
        assert_eq!(priors[3], 0.0);
    }

    #[test]
    fn test_stochastic_update_is_binary() {
        let mut posterior = BernoulliPosterior::new(PriorVector::zeros(1), true).unwrap();
        let mut rng = rng();
        for _ in 0..20 {
            posterior.update(100.0, 0, &mut rng).unwrap();
        }
        let priors = posterior.priors().as_slice();
        assert_eq!(priors[0] + priors[1], 20.0, "each update adds exactly one count");
        assert_eq!(priors[0].fract(), 0.0);
        assert_eq!(priors[1].fract(), 0.0);
    }

    #[test]
    fn test_stochastic_update_at_upper_limit_always_succeeds() {
        let mut posterior = BernoulliPosterior::new(PriorVector::zeros(1), true).unwrap();
        let mut rng = rng();
        for _ in 0..10 {
            posterior.update(UPPER_LIMIT, 0, &mut rng).unwrap();
        }
        assert_eq!(posterior.priors().as_slice(), &[10.0, 0.0]);
    }

    #[test]
    fn test_choice_prefers_successful_strategy() {
        let priors = PriorVector::new(vec![30.0, 0.0, 0.0, 30.0]);
        let posterior = BernoulliPosterior::new(priors, false).unwrap();
        let mut rng = rng();
        let picks = (0..100)
            .filter(|_| posterior.choose(&mut rng).unwrap() == 0)
            .count();
        assert!(picks > 95, "strategy 0 should dominate, picked {picks} times");
    }

    #[test]
    fn test_uniform_likelihoods() {
        let posterior = BernoulliPosterior::new(PriorVector::zeros(3), false).unwrap();
        let likelihoods = posterior
            .max_likelihoods(&mut IntegrationCache::new(), &QuadratureOptions::default())
            .unwrap();
        for l in &likelihoods {
            assert!((l - 1.0 / 3.0).abs() < 1e-4, "got {l}");
        }
    }

    #[test]
    fn test_two_strategy_likelihood_closed_form() {
        // Beta(2,1) vs Beta(1,1): P(X > Y) = ∫ 2x * x dx = 2/3
        let priors = PriorVector::new(vec![1.0, 0.0, 0.0, 0.0]);
        let posterior = BernoulliPosterior::new(priors, false).unwrap();
        let likelihoods = posterior
            .max_likelihoods(&mut IntegrationCache::new(), &QuadratureOptions::default())
            .unwrap();
        assert!((likelihoods[0] - 2.0 / 3.0).abs() < 1e-4, "got {}", likelihoods[0]);
        assert!((likelihoods[1] - 1.0 / 3.0).abs() < 1e-4, "got {}", likelihoods[1]);
    }
}

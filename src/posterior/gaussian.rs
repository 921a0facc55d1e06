use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use super::{argmax, PriorFamily, PriorVector, StrategyPosterior};
use crate::error::RsslError;
use crate::special::Marginal;

/// Number of standard deviations the integration support extends past each mean
const SUPPORT_SIGMAS: f64 = 5.0;

/// Gaussian posteriors over a static latent mean with known observation noise
#[derive(Clone, Debug)]
pub struct GaussianPosterior {
    priors: PriorVector,
    /// Fixed observation variance
    variance: f64,
}

impl GaussianPosterior {
    pub fn new(priors: PriorVector, variance: f64) -> Result<Self, RsslError> {
        if !variance.is_finite() || variance <= 0.0 {
            return Err(RsslError::InvalidVariance(variance));
        }
        priors.validate(priors.num_strategies(), PriorFamily::Gaussian)?;
        Ok(Self { priors, variance })
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    fn std_devs(&self) -> impl Iterator<Item = f64> + '_ {
        self.priors.second().iter().map(|v| v.sqrt())
    }
}

impl StrategyPosterior for GaussianPosterior {
    fn family(&self) -> PriorFamily {
        PriorFamily::Gaussian
    }

    fn priors(&self) -> &PriorVector {
        &self.priors
    }

    fn set_priors(&mut self, priors: PriorVector) -> Result<(), RsslError> {
        priors.validate(self.num_strategies(), PriorFamily::Gaussian)?;
        self.priors = priors;
        Ok(())
    }

    fn choose(&self, rng: &mut ChaCha8Rng) -> Result<usize, RsslError> {
        let mut values = Vec::with_capacity(self.num_strategies());
        for (index, (&mean, std_dev)) in self
            .priors
            .first()
            .iter()
            .zip(self.std_devs())
            .enumerate()
        {
            let dist = Normal::new(mean, std_dev).map_err(|_| RsslError::InvalidPrior {
                index: index + self.num_strategies(),
                value: std_dev * std_dev,
                reason: "variances must be positive",
            })?;
            values.push(dist.sample(rng));
        }
        Ok(argmax(&values))
    }

    /// Kalman-style update: precision-weighted mean, shrinking variance
    fn update(
        &mut self,
        reward: f64,
        index: usize,
        _rng: &mut ChaCha8Rng,
    ) -> Result<(), RsslError> {
        let var = self.variance;
        let (mean, prior_var) = self.priors.pair_mut(index);
        let denom = *prior_var + var;
        *mean = (*prior_var * reward + *mean * var) / denom;
        *prior_var = *prior_var * var / denom;

        if !mean.is_finite() || prior_var.is_nan() || *prior_var <= 0.0 {
            return Err(RsslError::InvalidPrior {
                index,
                value: *mean,
                reason: "Gaussian update left the posterior degenerate",
            });
        }
        Ok(())
    }

    fn marginals(&self) -> Vec<Marginal> {
        self.priors
            .first()
            .iter()
            .zip(self.std_devs())
            .map(|(&mean, std_dev)| Marginal::Normal { mean, std_dev })
            .collect()
    }

    fn support(&self) -> (f64, f64) {
        let mut lower = f64::INFINITY;
        let mut upper = f64::NEG_INFINITY;
        for (&mean, std_dev) in self.priors.first().iter().zip(self.std_devs()) {
            lower = lower.min(mean - SUPPORT_SIGMAS * std_dev);
            upper = upper.max(mean + SUPPORT_SIGMAS * std_dev);
        }
        (lower, upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadrature::{IntegrationCache, QuadratureOptions};
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_rejects_non_positive_variance() {
        let priors = PriorVector::new(vec![0.0, 0.0, 1.0, 1.0]);
        assert!(matches!(
            GaussianPosterior::new(priors.clone(), 0.0),
            Err(RsslError::InvalidVariance(_))
        ));
        assert!(GaussianPosterior::new(priors, -1.0).is_err());
    }

    #[test]
    fn test_single_observation_update() {
        let priors = PriorVector::new(vec![0.0, 0.0, 1.0, 1.0]);
        let mut posterior = GaussianPosterior::new(priors, 1.0).unwrap();
        posterior.update(2.0, 0, &mut rng()).unwrap();
        assert_eq!(posterior.priors().as_slice(), &[1.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_variance_shrinks_monotonically() {
        let priors = PriorVector::new(vec![0.0, 4.0]);
        let mut posterior = GaussianPosterior::new(priors, 2.0).unwrap();
        let mut rng = rng();
        let mut last = posterior.priors().second()[0];
        for step in 0..50 {
            posterior.update(3.0, 0, &mut rng).unwrap();
            let current = posterior.priors().second()[0];
            assert!(current < last, "variance should shrink at step {step}");
            assert!(current > 0.0);
            last = current;
        }
        // After n observations: 1/v = 1/4 + n/2
        assert!((last - 1.0 / (0.25 + 25.0)).abs() < 1e-12);
        assert!((posterior.priors().first()[0] - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_support_spans_five_sigma() {
        let priors = PriorVector::new(vec![0.0, 10.0, 1.0, 4.0]);
        let posterior = GaussianPosterior::new(priors, 1.0).unwrap();
        assert_eq!(posterior.support(), (-5.0, 20.0));
    }

    #[test]
    fn test_choice_follows_means() {
        let priors = PriorVector::new(vec![0.0, 5.0, 0.0, 0.1, 0.1, 0.1]);
        let posterior = GaussianPosterior::new(priors, 1.0).unwrap();
        let mut rng = rng();
        for _ in 0..50 {
            assert_eq!(posterior.choose(&mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_likelihoods_sum_to_one() {
        let priors = PriorVector::new(vec![0.0, 0.5, -0.3, 1.0, 0.25, 2.0]);
        let posterior = GaussianPosterior::new(priors, 1.0).unwrap();
        let likelihoods = posterior
            .max_likelihoods(&mut IntegrationCache::new(), &QuadratureOptions::default())
            .unwrap();
        let total: f64 = likelihoods.iter().sum();
        assert!((total - 1.0).abs() < 1e-3, "sum = {total}");
        assert!(likelihoods[1] > likelihoods[0], "higher mean should be likelier max");
    }

    #[test]
    fn test_likelihoods_with_extreme_variance_ratio() {
        // std 100 next to std 0.01
        let priors = PriorVector::new(vec![0.0, 1.0, 10000.0, 0.0001]);
        let posterior = GaussianPosterior::new(priors, 1.0).unwrap();
        let likelihoods = posterior
            .max_likelihoods(&mut IntegrationCache::new(), &QuadratureOptions::default())
            .unwrap();
        assert!((likelihoods[0] - 0.496).abs() < 1e-3, "{likelihoods:?}");
        assert!((likelihoods[1] - 0.504).abs() < 1e-3, "{likelihoods:?}");
    }
}

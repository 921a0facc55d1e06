//! RSSL strategy-selection learner
//!
//! Thompson sampling over a fixed strategy space with conjugate updates, and
//! the trial loop that drives it through an experiment. A run is either a
//! forward simulation (strategies chosen by the learner and executed in the
//! environment) or a likelihood evaluation of a participant's observed
//! strategies, never both.
//!
//! Each learner owns its prior vector, RNG and integration cache, so
//! independent learners can run on separate threads.

mod state;

pub use state::{LearnerState, STATE_VERSION};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::{LearnerConfig, ModelKind};
use crate::env::{ActionScorer, PlanningEnv, StrategyCatalog};
use crate::error::RsslError;
use crate::posterior::{
    BernoulliPosterior, GaussianPosterior, PriorFamily, PriorVector, StrategyPosterior,
};
use crate::quadrature::{IntegrationCache, QuadratureOptions};
use crate::types::{
    default_seed, Action, ObservedTrajectory, ObservedTrial, Participant, SimulationOutput,
    StrategyId, StrategyWeights, TrialRecord,
};

// ==================== Run Mode ====================

/// What a run does on every trial
pub enum RunMode<'a, T> {
    /// Choose strategies and execute their clicks
    Simulate { catalog: &'a dyn StrategyCatalog<T> },
    /// Score observed strategies and clicks
    Likelihood {
        observed: &'a ObservedTrajectory,
        scorer: &'a dyn ActionScorer<T>,
    },
}

impl<T> RunMode<'_, T> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Simulate { .. } => "simulate",
            Self::Likelihood { .. } => "likelihood",
        }
    }
}

/// Clicks and per-click signals of one executed strategy
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrategyOutcome {
    pub actions: Vec<Action>,
    pub rewards: Vec<f64>,
    pub delays: Vec<f64>,
    pub pseudo_rewards: Vec<f64>,
    pub taken_path: Option<Vec<usize>>,
}

impl StrategyOutcome {
    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }
}

// ==================== Learner ====================

pub struct RsslLearner {
    posterior: Box<dyn StrategyPosterior>,
    strategy_space: Vec<StrategyId>,
    strategy_weights: StrategyWeights,
    subjective_cost: f64,
    delay_scale: f64,
    pr_weight: f64,
    is_null: bool,
    stochastic_updating: bool,
    /// Observation variance in natural space (Gaussian only)
    gaussian_var: f64,
    quadrature: QuadratureOptions,
    rng: ChaCha8Rng,
    cache: IntegrationCache,
    update_count: u64,
}

impl RsslLearner {
    /// Build a learner; every configuration error surfaces here
    pub fn new(config: &LearnerConfig) -> Result<Self, RsslError> {
        config.validate()?;
        let (priors, gaussian_var) = config.resolved_params();

        let posterior: Box<dyn StrategyPosterior> = match config.family() {
            PriorFamily::Bernoulli => {
                Box::new(BernoulliPosterior::new(priors, config.stochastic_updating)?)
            }
            PriorFamily::Gaussian => Box::new(GaussianPosterior::new(priors, gaussian_var)?),
        };

        let seed = config.seed.unwrap_or_else(default_seed);

        Ok(Self {
            posterior,
            strategy_space: config.strategy_space.clone(),
            strategy_weights: config.strategy_weights.clone(),
            subjective_cost: config.subjective_cost,
            delay_scale: config.delay_scale,
            pr_weight: config.pr_weight,
            is_null: config.is_null,
            stochastic_updating: config.stochastic_updating,
            gaussian_var,
            quadrature: config.quadrature.clone(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            cache: IntegrationCache::new(),
            update_count: 0,
        })
    }

    // ==================== Accessors ====================

    pub fn model_kind(&self) -> ModelKind {
        match (self.posterior.family(), self.is_null) {
            (PriorFamily::Bernoulli, false) => ModelKind::BernoulliRssl,
            (PriorFamily::Gaussian, false) => ModelKind::GaussianRssl,
            (PriorFamily::Bernoulli, true) => ModelKind::NullBernoulliRssl,
            (PriorFamily::Gaussian, true) => ModelKind::NullGaussianRssl,
        }
    }

    pub fn priors(&self) -> &PriorVector {
        self.posterior.priors()
    }

    pub fn strategy_space(&self) -> &[StrategyId] {
        &self.strategy_space
    }

    pub fn num_strategies(&self) -> usize {
        self.strategy_space.len()
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn cache(&self) -> &IntegrationCache {
        &self.cache
    }

    /// Position of `strategy` in the strategy space
    pub fn strategy_index(&self, strategy: StrategyId) -> Option<usize> {
        self.strategy_space.iter().position(|&id| id == strategy)
    }

    /// Feature weights of `strategy`, empty when none were configured
    pub fn strategy_weights(&self, strategy: StrategyId) -> &[f64] {
        self.strategy_weights
            .get(&strategy)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ==================== Selection and Update ====================

    /// Thompson-sample a strategy id from the current posteriors
    pub fn select_strategy(&mut self) -> Result<StrategyId, RsslError> {
        let index = self.posterior.choose(&mut self.rng)?;
        Ok(self.strategy_space[index])
    }

    /// Update the posterior of strategy `index` with `reward`; no-op for null models
    pub fn update_params(&mut self, reward: f64, index: usize) -> Result<(), RsslError> {
        if self.is_null {
            return Ok(());
        }
        if index >= self.num_strategies() {
            return Err(RsslError::StrategyIndexOutOfRange {
                index,
                num_strategies: self.num_strategies(),
            });
        }
        self.posterior.update(reward, index, &mut self.rng)?;
        self.update_count += 1;
        Ok(())
    }

    /// Probability of each strategy being chosen under the current priors
    pub fn max_likelihoods(&mut self) -> Result<Vec<f64>, RsslError> {
        self.posterior.max_likelihoods(&mut self.cache, &self.quadrature)
    }

    /// Drop memoized density evaluations
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Every strategy in the space must be executable by `catalog`
    pub fn check_catalog<T>(&self, catalog: &dyn StrategyCatalog<T>) -> Result<(), RsslError> {
        match self.strategy_space.iter().find(|&&id| !catalog.contains(id)) {
            Some(&missing) => Err(RsslError::UnknownStrategy(missing)),
            None => Ok(()),
        }
    }

    // ==================== Trial Steps ====================

    /// Execute `strategy`'s clicks on the present trial
    pub fn apply_strategy<E: PlanningEnv>(
        &self,
        env: &mut E,
        catalog: &dyn StrategyCatalog<E::Trial>,
        strategy: StrategyId,
    ) -> Result<StrategyOutcome, RsslError> {
        env.reset_trial();
        let actions = catalog
            .actions(strategy, env.present_trial())
            .ok_or(RsslError::UnknownStrategy(strategy))?;

        let mut outcome = StrategyOutcome {
            actions: Vec::with_capacity(actions.len()),
            rewards: Vec::with_capacity(actions.len()),
            delays: Vec::with_capacity(actions.len()),
            pseudo_rewards: Vec::with_capacity(actions.len()),
            taken_path: None,
        };
        for action in actions {
            let delay = self.delay_scale * env.get_feedback(action);
            let before = env.max_expected_return();
            let step = env.step(action);
            let after = env.max_expected_return();

            outcome.actions.push(action);
            outcome.rewards.push(step.reward);
            outcome.delays.push(delay);
            outcome.pseudo_rewards.push(self.pr_weight * (after - before));
            if step.taken_path.is_some() {
                outcome.taken_path = step.taken_path;
            }
            if step.done {
                break;
            }
        }
        Ok(outcome)
    }

    /// Reward the priors are updated with after a simulated trial
    pub fn adjusted_reward(&self, outcome: &StrategyOutcome) -> f64 {
        let clicks = outcome.actions.len().saturating_sub(1) as f64;
        outcome.total_reward() - clicks * self.subjective_cost
            - outcome.delays.iter().sum::<f64>()
            + outcome.pseudo_rewards.iter().sum::<f64>()
    }

    /// `ln P(strategy) + ln P(clicks | strategy)` for one observed trial
    pub fn compute_log_likelihood<T>(
        &mut self,
        trial: &T,
        observed: &ObservedTrial,
        scorer: &dyn ActionScorer<T>,
        temperature: f64,
    ) -> Result<f64, RsslError> {
        let index = self
            .strategy_index(observed.strategy)
            .ok_or(RsslError::UnobservableStrategy(observed.strategy))?;
        let likelihoods = self.max_likelihoods()?;
        let weights = self.strategy_weights(observed.strategy);
        let action_ll = scorer.log_likelihood(trial, &observed.clicks, weights, temperature);
        if action_ll.is_nan() || action_ll == f64::INFINITY {
            return Err(RsslError::NonFiniteLikelihood(action_ll));
        }
        Ok(likelihoods[index].ln() + action_ll)
    }

    // ==================== Trial Loop ====================

    /// Run one experiment through `env`.
    ///
    /// The environment is rewound and the integration cache cleared first.
    /// Any failure aborts the run and names the failing trial.
    pub fn simulate<E: PlanningEnv>(
        &mut self,
        env: &mut E,
        mode: RunMode<'_, E::Trial>,
        participant: &Participant,
    ) -> Result<SimulationOutput, RsslError> {
        env.reset();
        self.cache.clear();
        let temperature = participant.temperature();
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(RsslError::InvalidTemperature(temperature));
        }
        if let RunMode::Simulate { catalog } = &mode {
            self.check_catalog(*catalog)?;
        }

        let num_trials = env.num_trials();
        info!(
            mode = mode.name(),
            model = ?self.model_kind(),
            num_strategies = self.num_strategies(),
            num_trials,
            pid = ?participant.pid,
            "Starting RSSL run"
        );

        let mut trials = Vec::with_capacity(num_trials);
        let mut total_log_likelihood = 0.0;
        for trial in 0..num_trials {
            let record = match &mode {
                RunMode::Simulate { catalog } => self.simulate_trial(env, *catalog, trial)?,
                RunMode::Likelihood { observed, scorer } => {
                    let record =
                        self.likelihood_trial(env, observed, *scorer, temperature, trial)?;
                    total_log_likelihood += record.log_likelihood.unwrap_or(0.0);
                    record
                }
            };
            debug!(
                trial,
                strategy = record.strategy,
                clicks = record.actions.len(),
                reward = record.reward,
                log_likelihood = ?record.log_likelihood,
                "Trial complete"
            );
            trials.push(record);
            env.get_next_trial();
        }

        let loss = match mode {
            RunMode::Simulate { .. } => None,
            RunMode::Likelihood { .. } => Some(-total_log_likelihood),
        };
        info!(
            trials = trials.len(),
            loss = ?loss,
            cache_hits = self.cache.hits(),
            cache_misses = self.cache.misses(),
            "RSSL run finished"
        );
        Ok(SimulationOutput { trials, loss })
    }

    fn simulate_trial<E: PlanningEnv>(
        &mut self,
        env: &mut E,
        catalog: &dyn StrategyCatalog<E::Trial>,
        trial: usize,
    ) -> Result<TrialRecord, RsslError> {
        let strategy = self
            .select_strategy()
            .map_err(|e| e.in_trial(trial, None))?;
        let in_trial = |e: RsslError| e.in_trial(trial, Some(strategy));

        let outcome = self.apply_strategy(env, catalog, strategy).map_err(in_trial)?;
        let update_reward = self.adjusted_reward(&outcome);
        let index = self
            .strategy_index(strategy)
            .ok_or(RsslError::UnknownStrategy(strategy))
            .map_err(in_trial)?;
        self.update_params(update_reward, index).map_err(in_trial)?;

        Ok(TrialRecord {
            trial,
            strategy,
            reward: outcome.total_reward(),
            update_reward,
            weights: self.strategy_weights(strategy).to_vec(),
            actions: outcome.actions,
            rewards: outcome.rewards,
            delays: outcome.delays,
            pseudo_rewards: outcome.pseudo_rewards,
            log_likelihood: None,
            taken_path: outcome.taken_path,
        })
    }

    fn likelihood_trial<E: PlanningEnv>(
        &mut self,
        env: &mut E,
        observed: &ObservedTrajectory,
        scorer: &dyn ActionScorer<E::Trial>,
        temperature: f64,
        trial: usize,
    ) -> Result<TrialRecord, RsslError> {
        let record = observed.trial(trial).map_err(|e| e.in_trial(trial, None))?;
        let strategy = record.strategy;
        let in_trial = |e: RsslError| e.in_trial(trial, Some(strategy));

        let log_likelihood = self
            .compute_log_likelihood(env.present_trial(), record, scorer, temperature)
            .map_err(in_trial)?;
        let reward: f64 = record.rewards.iter().sum();
        let index = self
            .strategy_index(strategy)
            .ok_or(RsslError::UnobservableStrategy(strategy))
            .map_err(in_trial)?;
        self.update_params(reward, index).map_err(in_trial)?;

        Ok(TrialRecord {
            trial,
            strategy,
            actions: record.clicks.clone(),
            rewards: record.rewards.clone(),
            delays: Vec::new(),
            pseudo_rewards: Vec::new(),
            reward,
            update_reward: reward,
            weights: self.strategy_weights(strategy).to_vec(),
            log_likelihood: Some(log_likelihood),
            taken_path: None,
        })
    }
}

impl std::fmt::Debug for RsslLearner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsslLearner")
            .field("model", &self.model_kind())
            .field("strategy_space", &self.strategy_space)
            .field("priors", self.posterior.priors())
            .field("update_count", &self.update_count)
            .finish()
    }
}

//! Parallel batch drivers
//!
//! Monte-Carlo strategy scoring and batches of independent learner runs.
//! Every parallel task builds its own environment (and learner) from a
//! per-task seed; nothing mutable is shared between tasks.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LearnerConfig;
use crate::env::{PlanningEnv, StrategyCatalog};
use crate::error::RsslError;
use crate::rssl::{RsslLearner, RunMode};
use crate::types::{default_seed, Participant, SimulationOutput, StrategyId, TERMINATE};

// ==================== Strategy Scoring ====================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Independent single-trial environments per strategy
    pub num_simulations: usize,
    /// Cost per click beyond the first
    pub click_cost: f64,
    /// Simulation `i` builds its environment from seed `base_seed + i`
    pub base_seed: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            num_simulations: 100,
            click_cost: 10.0,
            base_seed: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyScore {
    pub strategy: StrategyId,
    pub mean_score: f64,
    pub std_dev: f64,
    pub num_simulations: usize,
}

/// Score one strategy on one environment: expected return after its clicks,
/// minus the cost of every click but the terminating one
fn score_once<E, C>(
    env: &mut E,
    catalog: &C,
    strategy: StrategyId,
    click_cost: f64,
) -> Result<f64, RsslError>
where
    E: PlanningEnv,
    C: StrategyCatalog<E::Trial> + ?Sized,
{
    env.reset();
    let clicks = catalog
        .actions(strategy, env.present_trial())
        .ok_or(RsslError::UnknownStrategy(strategy))?;
    for &action in clicks.iter().filter(|&&a| a != TERMINATE) {
        env.step(action);
    }
    let extra_clicks = clicks.len().saturating_sub(1) as f64;
    Ok(env.max_expected_return() - extra_clicks * click_cost)
}

/// Mean Monte-Carlo score of each strategy, best first
pub fn score_strategies<E, F, C>(
    env_factory: F,
    catalog: &C,
    strategies: &[StrategyId],
    config: &ScoringConfig,
) -> Result<Vec<StrategyScore>, RsslError>
where
    E: PlanningEnv,
    F: Fn(u64) -> Result<E, RsslError> + Sync,
    C: StrategyCatalog<E::Trial> + Sync + ?Sized,
{
    if let Some(&missing) = strategies.iter().find(|&&id| !catalog.contains(id)) {
        return Err(RsslError::UnknownStrategy(missing));
    }
    info!(
        strategies = strategies.len(),
        num_simulations = config.num_simulations,
        "Scoring strategies"
    );

    let mut scores = strategies
        .par_iter()
        .map(|&strategy| -> Result<StrategyScore, RsslError> {
            let samples = (0..config.num_simulations)
                .into_par_iter()
                .map(|i| {
                    let mut env = env_factory(config.base_seed.wrapping_add(i as u64))?;
                    score_once(&mut env, catalog, strategy, config.click_cost)
                })
                .collect::<Result<Vec<f64>, RsslError>>()?;

            let n = samples.len().max(1) as f64;
            let mean = samples.iter().sum::<f64>() / n;
            let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
            Ok(StrategyScore {
                strategy,
                mean_score: mean,
                std_dev: variance.sqrt(),
                num_simulations: samples.len(),
            })
        })
        .collect::<Result<Vec<_>, RsslError>>()?;

    scores.sort_by(|a, b| b.mean_score.total_cmp(&a.mean_score));
    Ok(scores)
}

// ==================== Batch Simulation ====================

/// Run `num_simulations` independent simulate-mode runs in parallel.
///
/// Run `i` uses learner seed `config.seed + i` and an environment built from
/// the same seed.
pub fn run_simulations<E, F, C>(
    config: &LearnerConfig,
    env_factory: F,
    catalog: &C,
    num_simulations: usize,
) -> Result<Vec<SimulationOutput>, RsslError>
where
    E: PlanningEnv,
    F: Fn(u64) -> Result<E, RsslError> + Sync,
    C: StrategyCatalog<E::Trial> + Sync,
{
    config.validate()?;
    let base_seed = config.seed.unwrap_or_else(default_seed);
    info!(num_simulations, base_seed, "Running batch simulations");

    (0..num_simulations)
        .into_par_iter()
        .map(|i| {
            let seed = base_seed.wrapping_add(i as u64);
            let mut learner = RsslLearner::new(&config.clone().with_seed(seed))?;
            let mut env = env_factory(seed)?;
            learner.simulate(
                &mut env,
                RunMode::Simulate { catalog },
                &Participant::default(),
            )
        })
        .collect()
}

/// Mean reward per trial index across runs
pub fn mean_reward_curve(outputs: &[SimulationOutput]) -> Vec<f64> {
    let len = outputs.iter().map(|o| o.trials.len()).max().unwrap_or(0);
    (0..len)
        .map(|t| {
            let rewards: Vec<f64> = outputs
                .iter()
                .filter_map(|o| o.trials.get(t).map(|r| r.reward))
                .collect();
            rewards.iter().sum::<f64>() / rewards.len() as f64
        })
        .collect()
}

//! Strategy-selection learning for Mouselab planning data
//!
//! RSSL models keep an independent conjugate posterior over the value of each
//! planning strategy, Thompson-sample a strategy every trial, and update the
//! chosen strategy's posterior with the reward it earned. The same learner
//! either simulates an experiment or scores a participant's observed
//! strategies by their marginal likelihood.
//!
//! Modules:
//! - `posterior`: Beta-Bernoulli and Gaussian posteriors over a flat prior vector
//! - `quadrature`: adaptive Gauss-Kronrod integration and the per-run cache
//! - `rssl`: the learner, its trial loop and state persistence
//! - `env`: planning environment, strategy catalog and action scorer contracts
//! - `mouselab`: a reference Mouselab environment and strategy catalog
//! - `scoring`: parallel Monte-Carlo strategy scoring and batch simulation
#![deny(clippy::all)]

pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod mouselab;
pub mod posterior;
pub mod quadrature;
pub mod rssl;
pub mod scoring;
pub mod special;
pub mod types;

pub use config::{LearnerConfig, ModelKind};
pub use env::{ActionScorer, PlanningEnv, StepOutcome, StrategyCatalog, StrategyFn, StrategyTable};
pub use error::{ErrorKind, RsslError};
pub use mouselab::{default_catalog, EnvConfig, MouselabEnv};
pub use posterior::{
    max_likelihoods, BernoulliPosterior, GaussianPosterior, PriorFamily, PriorVector,
    StrategyPosterior,
};
pub use quadrature::{
    integrate, integrate_with_breakpoints, IntegrationCache, QuadratureError, QuadratureOptions,
};
pub use rssl::{LearnerState, RsslLearner, RunMode, StrategyOutcome};
pub use scoring::{
    mean_reward_curve, run_simulations, score_strategies, ScoringConfig, StrategyScore,
};
pub use types::*;

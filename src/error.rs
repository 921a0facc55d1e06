use crate::quadrature::QuadratureError;
use crate::types::StrategyId;

/// Coarse classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid model or run configuration, raised before any trial runs
    Configuration,
    /// Non-convergent quadrature or out-of-range probabilities and rewards
    Numerical,
    /// Missing or inconsistent observed data
    Data,
}

#[derive(Debug, thiserror::Error)]
pub enum RsslError {
    #[error("strategy space is empty")]
    EmptyStrategySpace,
    #[error("strategy {0} appears more than once in the strategy space")]
    DuplicateStrategy(StrategyId),
    #[error("strategy {0} is not in the strategy catalog")]
    UnknownStrategy(StrategyId),
    #[error("strategy index {index} is outside a space of {num_strategies} strategies")]
    StrategyIndexOutOfRange { index: usize, num_strategies: usize },
    #[error("no feature weights for strategy {0}")]
    MissingStrategyWeights(StrategyId),
    #[error("prior vector has length {actual}, expected {expected}")]
    PriorLengthMismatch { expected: usize, actual: usize },
    #[error("prior entry {index} = {value} is invalid: {reason}")]
    InvalidPrior {
        index: usize,
        value: f64,
        reason: &'static str,
    },
    #[error("observation variance must be finite and positive, got {0}")]
    InvalidVariance(f64),
    #[error("temperature must be finite and positive, got {0}")]
    InvalidTemperature(f64),
    #[error("learner state does not match this model: {0}")]
    StateMismatch(String),
    #[error("invalid environment configuration: {0}")]
    InvalidEnvConfig(String),

    #[error("marginal likelihood of strategy index {strategy_index}: {source}")]
    Quadrature {
        strategy_index: usize,
        #[source]
        source: QuadratureError,
    },
    #[error("probability {value} of strategy index {strategy_index} is outside [0, 1]")]
    ProbabilityOutOfRange { strategy_index: usize, value: f64 },
    #[error("marginal likelihoods sum to {total}, more than {tolerance} away from one")]
    LikelihoodSumDrift { total: f64, tolerance: f64 },
    #[error("reward {reward} is outside the normalization buffer [{lower}, {upper}]")]
    RewardOutOfRange { reward: f64, lower: f64, upper: f64 },
    #[error("action log-likelihood is not finite: {0}")]
    NonFiniteLikelihood(f64),

    #[error("no observed record for trial {0}")]
    MissingObservedTrial(usize),
    #[error("observed strategy {0} is not in the strategy space")]
    UnobservableStrategy(StrategyId),

    #[error("trial {trial} (strategy {strategy:?}) failed: {source}")]
    Trial {
        trial: usize,
        strategy: Option<StrategyId>,
        #[source]
        source: Box<RsslError>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RsslError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyStrategySpace
            | Self::DuplicateStrategy(_)
            | Self::UnknownStrategy(_)
            | Self::StrategyIndexOutOfRange { .. }
            | Self::MissingStrategyWeights(_)
            | Self::PriorLengthMismatch { .. }
            | Self::InvalidPrior { .. }
            | Self::InvalidVariance(_)
            | Self::InvalidTemperature(_)
            | Self::StateMismatch(_)
            | Self::InvalidEnvConfig(_)
            | Self::Serialization(_)
            | Self::Io(_) => ErrorKind::Configuration,
            Self::Quadrature { .. }
            | Self::ProbabilityOutOfRange { .. }
            | Self::LikelihoodSumDrift { .. }
            | Self::RewardOutOfRange { .. }
            | Self::NonFiniteLikelihood(_) => ErrorKind::Numerical,
            Self::MissingObservedTrial(_) | Self::UnobservableStrategy(_) => ErrorKind::Data,
            Self::Trial { source, .. } => source.kind(),
        }
    }

    /// Attach the trial index and strategy at which a run aborted
    pub(crate) fn in_trial(self, trial: usize, strategy: Option<StrategyId>) -> Self {
        Self::Trial {
            trial,
            strategy,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_error_keeps_inner_kind() {
        let err = RsslError::MissingObservedTrial(3).in_trial(3, Some(7));
        assert_eq!(err.kind(), ErrorKind::Data);
        let msg = err.to_string();
        assert!(msg.contains("trial 3"), "message should name the trial: {msg}");
        assert!(msg.contains("7"), "message should name the strategy: {msg}");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(RsslError::InvalidVariance(0.0).kind(), ErrorKind::Configuration);
        assert_eq!(
            RsslError::RewardOutOfRange {
                reward: 300.0,
                lower: -250.0,
                upper: 250.0
            }
            .kind(),
            ErrorKind::Numerical
        );
    }
}

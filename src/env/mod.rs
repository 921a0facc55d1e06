//! Collaborator contracts
//!
//! The learner drives a planning environment, asks a strategy catalog for
//! click sequences and, when scoring data, asks an action-likelihood model
//! how probable the observed clicks were. All three are traits so the real
//! Mouselab simulator and strategy library plug in from outside the crate.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::{Action, StrategyId};

// ==================== Planning Environment ====================

/// Result of executing one action
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutcome {
    /// Value revealed by the click (0 for termination)
    pub observation: f64,
    pub reward: f64,
    pub done: bool,
    /// Path executed on termination
    pub taken_path: Option<Vec<usize>>,
}

/// A sequence of planning trials
pub trait PlanningEnv {
    /// Per-trial state handed to strategies and the action-likelihood model
    type Trial;

    fn num_trials(&self) -> usize;

    /// Rewind to the first trial
    fn reset(&mut self);

    /// Clear the present trial's transient click state
    fn reset_trial(&mut self);

    /// The trial currently being played
    fn present_trial(&self) -> &Self::Trial;

    /// Pristine state of trial `index`, `None` past the last trial
    fn trial(&self, index: usize) -> Option<&Self::Trial>;

    /// Feedback delay incurred by an action
    fn get_feedback(&mut self, action: Action) -> f64;

    fn step(&mut self, action: Action) -> StepOutcome;

    fn get_next_trial(&mut self);

    /// Expected return of the best plan from the present trial's root
    fn max_expected_return(&self) -> f64;
}

// ==================== Strategy Catalog ====================

/// Maps strategy ids to click-sequence generators
pub trait StrategyCatalog<T> {
    /// Click sequence of `strategy` on `trial`, `None` for unknown ids
    fn actions(&self, strategy: StrategyId, trial: &T) -> Option<Vec<Action>>;

    fn contains(&self, strategy: StrategyId) -> bool;
}

/// Boxed strategy implementation
pub type StrategyFn<T> = Box<dyn Fn(&T) -> Vec<Action> + Send + Sync>;

/// Map-backed strategy catalog
pub struct StrategyTable<T> {
    strategies: BTreeMap<StrategyId, StrategyFn<T>>,
}

impl<T> StrategyTable<T> {
    pub fn new() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    pub fn insert<F>(&mut self, id: StrategyId, strategy: F) -> &mut Self
    where
        F: Fn(&T) -> Vec<Action> + Send + Sync + 'static,
    {
        self.strategies.insert(id, Box::new(strategy));
        self
    }

    pub fn ids(&self) -> Vec<StrategyId> {
        self.strategies.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl<T> Default for StrategyTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for StrategyTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyTable")
            .field("ids", &self.ids())
            .finish()
    }
}

impl<T> StrategyCatalog<T> for StrategyTable<T> {
    fn actions(&self, strategy: StrategyId, trial: &T) -> Option<Vec<Action>> {
        self.strategies.get(&strategy).map(|f| f(trial))
    }

    fn contains(&self, strategy: StrategyId) -> bool {
        self.strategies.contains_key(&strategy)
    }
}

// ==================== Action Likelihood ====================

/// Log-probability of a click sequence under a strategy's feature weights
pub trait ActionScorer<T> {
    fn log_likelihood(&self, trial: &T, actions: &[Action], weights: &[f64], temperature: f64)
        -> f64;
}

impl<T, F> ActionScorer<T> for F
where
    F: Fn(&T, &[Action], &[f64], f64) -> f64,
{
    fn log_likelihood(
        &self,
        trial: &T,
        actions: &[Action],
        weights: &[f64],
        temperature: f64,
    ) -> f64 {
        self(trial, actions, weights, temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_table_lookup() {
        let mut table: StrategyTable<usize> = StrategyTable::new();
        table
            .insert(1, |_| vec![0])
            .insert(2, |&depth| (1..=depth).chain(std::iter::once(0)).collect());

        assert_eq!(table.len(), 2);
        assert!(table.contains(2));
        assert!(!table.contains(3));
        assert_eq!(table.actions(1, &3), Some(vec![0]));
        assert_eq!(table.actions(2, &3), Some(vec![1, 2, 3, 0]));
        assert_eq!(table.actions(9, &3), None);
    }

    #[test]
    fn test_closure_scorer() {
        let scorer = |_: &(), actions: &[Action], _: &[f64], temperature: f64| {
            -(actions.len() as f64) / temperature
        };
        assert_eq!(scorer.log_likelihood(&(), &[1, 2, 0], &[], 2.0), -1.5);
    }
}

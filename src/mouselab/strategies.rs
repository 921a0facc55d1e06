//! Canonical Mouselab planning strategies
//!
//! Each strategy maps a pristine trial to its click sequence, always ending
//! with the terminating action.

use super::Trial;
use crate::env::StrategyTable;
use crate::types::{Action, StrategyId, TERMINATE};

pub const NO_PLANNING: StrategyId = 1;
pub const IMMEDIATE_OUTCOMES: StrategyId = 2;
pub const GOAL_SETTING: StrategyId = 3;
pub const BREADTH_FIRST: StrategyId = 4;
pub const SATISFICING_LEAVES: StrategyId = 5;

fn no_planning(_trial: &Trial) -> Vec<Action> {
    vec![TERMINATE]
}

fn immediate_outcomes(trial: &Trial) -> Vec<Action> {
    let mut clicks = trial.nodes_at_depth(1);
    clicks.push(TERMINATE);
    clicks
}

fn goal_setting(trial: &Trial) -> Vec<Action> {
    let mut clicks = trial.leaves();
    clicks.push(TERMINATE);
    clicks
}

fn breadth_first(trial: &Trial) -> Vec<Action> {
    let mut clicks: Vec<Action> = (1..=trial.max_depth())
        .flat_map(|depth| trial.nodes_at_depth(depth))
        .collect();
    clicks.push(TERMINATE);
    clicks
}

/// Inspect leaves until one holds the best possible outcome
fn satisficing_leaves(trial: &Trial) -> Vec<Action> {
    let target = trial.best_level(trial.max_depth());
    let mut clicks = Vec::new();
    for leaf in trial.leaves() {
        clicks.push(leaf);
        let value = trial.node(leaf).map(|n| n.value);
        if value.is_some() && value == target {
            break;
        }
    }
    clicks.push(TERMINATE);
    clicks
}

/// Catalog with the five built-in strategies under ids 1..=5
pub fn default_catalog() -> StrategyTable<Trial> {
    let mut table = StrategyTable::new();
    table
        .insert(NO_PLANNING, no_planning)
        .insert(IMMEDIATE_OUTCOMES, immediate_outcomes)
        .insert(GOAL_SETTING, goal_setting)
        .insert(BREADTH_FIRST, breadth_first)
        .insert(SATISFICING_LEAVES, satisficing_leaves);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{PlanningEnv, StrategyCatalog};
    use crate::mouselab::{EnvConfig, MouselabEnv};

    fn env() -> MouselabEnv {
        MouselabEnv::new(EnvConfig {
            num_trials: 2,
            seed: Some(3),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_catalog_ids() {
        assert_eq!(default_catalog().ids(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_fixed_click_sequences() {
        let env = env();
        let catalog = default_catalog();
        let trial = env.present_trial();
        assert_eq!(catalog.actions(NO_PLANNING, trial), Some(vec![0]));
        assert_eq!(catalog.actions(IMMEDIATE_OUTCOMES, trial), Some(vec![1, 5, 9, 0]));
        assert_eq!(
            catalog.actions(GOAL_SETTING, trial),
            Some(vec![3, 4, 7, 8, 11, 12, 0])
        );
        let breadth = catalog.actions(BREADTH_FIRST, trial).unwrap();
        assert_eq!(breadth.len(), 13);
        assert_eq!(&breadth[..3], &[1, 5, 9]);
        assert_eq!(breadth.last(), Some(&TERMINATE));
    }

    #[test]
    fn test_satisficing_stops_at_best_leaf() {
        let env = env();
        let trial = env.present_trial();
        let clicks = default_catalog().actions(SATISFICING_LEAVES, trial).unwrap();
        assert_eq!(clicks.last(), Some(&TERMINATE));
        let inspected = &clicks[..clicks.len() - 1];
        assert!(!inspected.is_empty());
        for &leaf in &inspected[..inspected.len() - 1] {
            assert_ne!(trial.node(leaf).unwrap().value, 48.0, "should stop at leaf {leaf}");
        }
    }

    #[test]
    fn test_strategies_run_to_termination() {
        let mut env = env();
        let catalog = default_catalog();
        for id in catalog.ids() {
            env.reset_trial();
            let clicks = catalog.actions(id, env.present_trial()).unwrap();
            let mut done = false;
            for action in clicks {
                assert!(!done, "strategy {id} clicked after terminating");
                done = env.step(action).done;
            }
            assert!(done, "strategy {id} never terminated");
        }
    }
}

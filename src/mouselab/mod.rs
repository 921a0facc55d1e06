//! Mouselab planning environment
//!
//! A tree of hidden rewards. Clicking a node reveals its value at a fixed
//! cost; terminating (action `0`) moves along the path with the highest
//! expected return given what has been revealed and pays that return.
//! Unrevealed nodes are valued at the mean of their depth's reward levels.
//!
//! All structure lives in an [`EnvConfig`] handed to [`MouselabEnv::new`];
//! nothing is read from process-wide state.

mod strategies;

pub use strategies::{
    default_catalog, BREADTH_FIRST, GOAL_SETTING, IMMEDIATE_OUTCOMES, NO_PLANNING,
    SATISFICING_LEAVES,
};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::env::{PlanningEnv, StepOutcome};
use crate::error::RsslError;
use crate::types::{default_seed, Action, TERMINATE};

// ==================== Configuration ====================

/// Structure and payoffs of a Mouselab experiment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Children per node at each depth, e.g. `[3, 1, 2]`
    pub branching: Vec<usize>,
    /// Equiprobable reward levels for the nodes at each depth (1-based)
    pub reward_levels: Vec<Vec<f64>>,
    pub num_trials: usize,
    /// Reward charged per click
    pub click_cost: f64,
    /// Feedback delay per click
    pub feedback_delay: f64,
    /// Seed for sampling ground-truth rewards
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            branching: vec![3, 1, 2],
            reward_levels: vec![
                vec![-4.0, -2.0, 2.0, 4.0],
                vec![-8.0, -4.0, 4.0, 8.0],
                vec![-48.0, -24.0, 24.0, 48.0],
            ],
            num_trials: 35,
            click_cost: 1.0,
            feedback_delay: 0.0,
            seed: None,
        }
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<(), RsslError> {
        if self.branching.is_empty() || self.branching.contains(&0) {
            return Err(RsslError::InvalidEnvConfig(
                "branching must be non-empty with positive entries".to_string(),
            ));
        }
        if self.reward_levels.len() != self.branching.len() {
            return Err(RsslError::InvalidEnvConfig(format!(
                "{} reward level sets for {} depths",
                self.reward_levels.len(),
                self.branching.len()
            )));
        }
        if self
            .reward_levels
            .iter()
            .any(|levels| levels.is_empty() || levels.iter().any(|v| !v.is_finite()))
        {
            return Err(RsslError::InvalidEnvConfig(
                "reward levels must be non-empty and finite".to_string(),
            ));
        }
        if self.num_trials == 0 {
            return Err(RsslError::InvalidEnvConfig(
                "num_trials must be positive".to_string(),
            ));
        }
        if !self.click_cost.is_finite() || !self.feedback_delay.is_finite() {
            return Err(RsslError::InvalidEnvConfig(
                "click cost and feedback delay must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Trial ====================

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: usize,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Ground-truth reward
    pub value: f64,
    pub observed: bool,
}

/// One planning tree, node 0 is the root
#[derive(Clone, Debug, PartialEq)]
pub struct Trial {
    nodes: Vec<Node>,
    /// Mean reward of an unrevealed node, per depth (index 0 is depth 1)
    expected: Vec<f64>,
    /// Largest reward level, per depth
    best_level: Vec<f64>,
}

impl Trial {
    /// Build a tree in depth-first order and draw its rewards
    pub fn sample<R: Rng>(config: &EnvConfig, rng: &mut R) -> Self {
        let mut nodes = vec![Node {
            id: 0,
            depth: 0,
            parent: None,
            children: Vec::new(),
            value: 0.0,
            observed: true,
        }];
        Self::grow(&mut nodes, 0, config, rng);

        let expected = config
            .reward_levels
            .iter()
            .map(|levels| levels.iter().sum::<f64>() / levels.len() as f64)
            .collect();
        let best_level = config
            .reward_levels
            .iter()
            .map(|levels| levels.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .collect();

        Self {
            nodes,
            expected,
            best_level,
        }
    }

    fn grow<R: Rng>(nodes: &mut Vec<Node>, parent: usize, config: &EnvConfig, rng: &mut R) {
        let depth = nodes[parent].depth;
        if depth >= config.branching.len() {
            return;
        }
        for _ in 0..config.branching[depth] {
            let id = nodes.len();
            let levels = &config.reward_levels[depth];
            let value = levels[rng.gen_range(0..levels.len())];
            nodes.push(Node {
                id,
                depth: depth + 1,
                parent: Some(parent),
                children: Vec::new(),
                value,
                observed: false,
            });
            nodes[parent].children.push(id);
            Self::grow(nodes, id, config, rng);
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> usize {
        self.expected.len()
    }

    pub fn nodes_at_depth(&self, depth: usize) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.depth == depth)
            .map(|n| n.id)
            .collect()
    }

    pub fn leaves(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.children.is_empty() && n.id != 0)
            .map(|n| n.id)
            .collect()
    }

    /// Highest reward any node at `depth` can hold
    pub fn best_level(&self, depth: usize) -> Option<f64> {
        depth
            .checked_sub(1)
            .and_then(|d| self.best_level.get(d))
            .copied()
    }

    /// Reveal a node; returns its value, `None` for the root or unknown ids
    pub fn observe(&mut self, id: usize) -> Option<f64> {
        if id == 0 {
            return None;
        }
        let node = self.nodes.get_mut(id)?;
        node.observed = true;
        Some(node.value)
    }

    fn belief(&self, id: usize) -> f64 {
        let node = &self.nodes[id];
        if node.observed {
            node.value
        } else {
            self.expected[node.depth - 1]
        }
    }

    fn best_from(&self, id: usize) -> (f64, Vec<usize>) {
        let own = self.belief(id);
        let mut best: Option<(f64, Vec<usize>)> = None;
        for &child in &self.nodes[id].children {
            let candidate = self.best_from(child);
            if best.as_ref().map_or(true, |(v, _)| candidate.0 > *v) {
                best = Some(candidate);
            }
        }
        let (rest, mut path) = best.unwrap_or((0.0, Vec::new()));
        path.insert(0, id);
        (own + rest, path)
    }

    /// Expected return of the best root-to-leaf path under revealed information
    pub fn max_expected_return(&self) -> f64 {
        self.best_from(0).0
    }

    /// Best root-to-leaf path under revealed information
    pub fn best_path(&self) -> Vec<usize> {
        self.best_from(0).1
    }

    /// Ground-truth reward collected along `path`, revealed or not
    pub fn path_value(&self, path: &[usize]) -> f64 {
        path.iter()
            .filter_map(|&id| self.nodes.get(id))
            .map(|node| node.value)
            .sum()
    }
}

// ==================== Environment ====================

/// A sequence of sampled Mouselab trials
#[derive(Clone, Debug)]
pub struct MouselabEnv {
    config: EnvConfig,
    trials: Vec<Trial>,
    present: Trial,
    index: usize,
}

impl MouselabEnv {
    pub fn new(config: EnvConfig) -> Result<Self, RsslError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(default_seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let trials: Vec<Trial> = (0..config.num_trials)
            .map(|_| Trial::sample(&config, &mut rng))
            .collect();
        let present = trials[0].clone();

        Ok(Self {
            config,
            trials,
            present,
            index: 0,
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Index of the trial being played
    pub fn present_index(&self) -> usize {
        self.index
    }
}

impl PlanningEnv for MouselabEnv {
    type Trial = Trial;

    fn num_trials(&self) -> usize {
        self.trials.len()
    }

    fn reset(&mut self) {
        self.index = 0;
        self.present = self.trials[0].clone();
    }

    fn reset_trial(&mut self) {
        self.present = self.trials[self.index].clone();
    }

    fn present_trial(&self) -> &Trial {
        &self.present
    }

    fn trial(&self, index: usize) -> Option<&Trial> {
        self.trials.get(index)
    }

    fn get_feedback(&mut self, action: Action) -> f64 {
        if action == TERMINATE {
            0.0
        } else {
            self.config.feedback_delay
        }
    }

    fn step(&mut self, action: Action) -> StepOutcome {
        if action == TERMINATE {
            let path = self.present.best_path();
            let reward = self.present.path_value(&path);
            return StepOutcome {
                observation: 0.0,
                reward,
                done: true,
                taken_path: Some(path),
            };
        }
        let observation = self.present.observe(action).unwrap_or(0.0);
        StepOutcome {
            observation,
            reward: -self.config.click_cost,
            done: false,
            taken_path: None,
        }
    }

    fn get_next_trial(&mut self) {
        if self.index + 1 < self.trials.len() {
            self.index += 1;
            self.present = self.trials[self.index].clone();
        }
    }

    fn max_expected_return(&self) -> f64 {
        self.present.max_expected_return()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EnvConfig {
        EnvConfig {
            num_trials: 3,
            seed: Some(11),
            ..Default::default()
        }
    }

    #[test]
    fn test_tree_shape() {
        let env = MouselabEnv::new(config()).unwrap();
        let trial = env.present_trial();
        assert_eq!(trial.num_nodes(), 13);
        assert_eq!(trial.nodes_at_depth(1), vec![1, 5, 9]);
        assert_eq!(trial.leaves(), vec![3, 4, 7, 8, 11, 12]);
        assert_eq!(trial.node(2).unwrap().parent, Some(1));
        assert_eq!(trial.best_level(3), Some(48.0));
        assert_eq!(trial.best_level(0), None);
    }

    #[test]
    fn test_unrevealed_expected_return_is_zero_for_symmetric_levels() {
        let env = MouselabEnv::new(config()).unwrap();
        assert!(env.max_expected_return().abs() < 1e-12);
    }

    #[test]
    fn test_click_reveals_and_costs() {
        let mut env = MouselabEnv::new(config()).unwrap();
        let leaf = 3;
        let value = env.present_trial().node(leaf).unwrap().value;
        let outcome = env.step(leaf);
        assert_eq!(outcome.reward, -1.0);
        assert_eq!(outcome.observation, value);
        assert!(!outcome.done);
        assert!(env.present_trial().node(leaf).unwrap().observed);
        assert_eq!(env.max_expected_return(), value.max(0.0));
    }

    #[test]
    fn test_terminate_follows_best_path() {
        let mut env = MouselabEnv::new(config()).unwrap();
        for leaf in env.present_trial().leaves() {
            env.step(leaf);
        }
        let expected = env.max_expected_return();
        let outcome = env.step(TERMINATE);
        assert!(outcome.done);
        let path = outcome.taken_path.unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path[0], 0);
        let truth: f64 = path
            .iter()
            .map(|&id| env.present_trial().node(id).unwrap().value)
            .sum();
        assert_eq!(outcome.reward, truth);
        // Leaves are revealed, inner nodes are still paid at their true value
        assert!((outcome.reward - expected).abs() <= 4.0 + 8.0);
    }

    #[test]
    fn test_terminate_without_clicks_pays_ground_truth() {
        let mut env = MouselabEnv::new(EnvConfig {
            num_trials: 20,
            seed: Some(5),
            ..Default::default()
        })
        .unwrap();
        let mut nonzero = 0;
        for _ in 0..20 {
            env.reset_trial();
            let trial = env.present_trial().clone();
            let outcome = env.step(TERMINATE);
            // With nothing revealed every path ties and the first one is taken
            assert_eq!(outcome.taken_path.as_deref(), Some(&[0, 1, 2, 3][..]));
            assert_eq!(outcome.reward, trial.path_value(&[0, 1, 2, 3]));
            if outcome.reward != 0.0 {
                nonzero += 1;
            }
            env.get_next_trial();
        }
        assert!(nonzero > 0, "ground-truth payouts should not all be zero");
    }

    #[test]
    fn test_trial_lookup_out_of_range() {
        let env = MouselabEnv::new(config()).unwrap();
        assert!(env.trial(2).is_some());
        assert!(env.trial(3).is_none());
    }

    #[test]
    fn test_reset_trial_restores_pristine_state() {
        let mut env = MouselabEnv::new(config()).unwrap();
        env.step(3);
        env.reset_trial();
        assert_eq!(Some(env.present_trial()), env.trial(0));
    }

    #[test]
    fn test_trial_sequence_advances_and_resets() {
        let mut env = MouselabEnv::new(config()).unwrap();
        env.get_next_trial();
        env.get_next_trial();
        env.get_next_trial();
        assert_eq!(env.present_index(), 2);
        env.reset();
        assert_eq!(env.present_index(), 0);
    }

    #[test]
    fn test_same_seed_same_trials() {
        let a = MouselabEnv::new(config()).unwrap();
        let b = MouselabEnv::new(config()).unwrap();
        assert_eq!(a.trial(2), b.trial(2));
    }

    #[test]
    fn test_invalid_config() {
        let mut bad = config();
        bad.reward_levels.pop();
        assert!(matches!(
            MouselabEnv::new(bad),
            Err(RsslError::InvalidEnvConfig(_))
        ));
    }
}

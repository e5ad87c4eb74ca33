//! Value iteration over a [`GridWorld`] and greedy policy extraction.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    Cell, SolveError,
    map::Grid,
    path::{PathTrace, reconstruct_path},
    world::{Action, GridWorld, Tile, Transition},
};

/// Greedy action per non-goal state.
pub type Policy = BTreeMap<Cell, Action>;
/// Value of the greedy action per state; the goal is pinned at zero.
pub type QValues = BTreeMap<Cell, f64>;

/// Tuning of the value iteration loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Discount factor, in `[0, 1)`.
    pub gamma: f64,
    /// Iteration stops once the largest per-state change drops below this.
    pub threshold: f64,
    /// Hard ceiling on the number of sweeps.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            threshold: 1e-3,
            max_iterations: 1000,
        }
    }
}

impl SolverConfig {
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    pub fn threshold(mut self, v: f64) -> Self {
        self.threshold = v;
        self
    }

    pub fn max_iterations(mut self, v: usize) -> Self {
        self.max_iterations = v;
        self
    }

    pub fn validate(&self) -> Result<(), SolveError> {
        if !(0.0..1.0).contains(&self.gamma) {
            return Err(SolveError::InvalidConfig(format!(
                "gamma must be in [0, 1), got {}",
                self.gamma
            )));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(SolveError::InvalidConfig(format!(
                "threshold must be positive and finite, got {}",
                self.threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(SolveError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// State values over the open cells of a grid. Obstacles carry no value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFunction {
    values: Grid<Option<f64>>,
}

impl ValueFunction {
    fn zeros(world: &GridWorld) -> Self {
        let values = world
            .tiles()
            .map(|tile| (*tile == Tile::Open).then_some(0.0));
        Self { values }
    }

    /// Value of `cell`, or `None` for obstacles and cells off the grid.
    pub fn get(&self, cell: Cell) -> Option<f64> {
        self.values.get(cell).copied().flatten()
    }

    // `step` never yields an obstacle, so every successor has a value.
    fn at(&self, cell: Cell) -> f64 {
        self.get(cell).unwrap_or(0.0)
    }
}

/// Result of running value iteration to convergence or to the iteration cap.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueIteration {
    pub values: ValueFunction,
    /// Number of sweeps performed.
    pub iterations: usize,
    /// False when the iteration cap was hit before `delta < threshold`.
    pub converged: bool,
    /// Largest per-state change of each sweep, in order.
    pub deltas: Vec<f64>,
}

/// One Bellman backup: the best action from `state` under `values`.
///
/// Ties keep the earliest action of [`Action::ALL`].
fn best_action(
    world: &GridWorld,
    values: &ValueFunction,
    state: Cell,
    gamma: f64,
) -> (Action, f64) {
    let mut best = (Action::ALL[0], f64::NEG_INFINITY);
    for action in Action::ALL {
        let Transition { next, reward } = world.step(state, action);
        let candidate = reward + gamma * values.at(next);
        if candidate > best.1 {
            best = (action, candidate);
        }
    }
    best
}

/// Synchronous value iteration.
///
/// Every sweep reads only the previous sweep's values. The goal stays at
/// zero throughout.
pub fn value_iteration(world: &GridWorld, config: &SolverConfig) -> ValueIteration {
    let goal = world.goal();
    let mut current = ValueFunction::zeros(world);
    let mut next = current.clone();
    let mut deltas = Vec::new();
    let mut converged = false;

    for _ in 0..config.max_iterations {
        let mut delta = 0.0_f64;
        for &state in world.states() {
            let value = if state == goal {
                0.0
            } else {
                best_action(world, &current, state, config.gamma).1
            };
            delta = delta.max((value - current.at(state)).abs());
            next.values[state] = Some(value);
        }

        std::mem::swap(&mut current, &mut next);
        deltas.push(delta);

        if delta < config.threshold {
            converged = true;
            break;
        }
    }

    let iterations = deltas.len();
    if converged {
        debug!(
            "value iteration converged after {} sweeps (delta {:e})",
            iterations,
            deltas.last().copied().unwrap_or_default()
        );
    } else {
        warn!(
            "value iteration stopped at {} sweeps without reaching threshold {:e}",
            iterations, config.threshold
        );
    }

    ValueIteration {
        values: current,
        iterations,
        converged,
        deltas,
    }
}

/// Derives the greedy policy and its Q-values from converged state values.
///
/// The goal gets a Q-value of zero and no policy entry.
pub fn extract_policy(world: &GridWorld, values: &ValueFunction, gamma: f64) -> (Policy, QValues) {
    let mut policy = Policy::new();
    let mut q_values = QValues::new();

    for &state in world.states() {
        if state == world.goal() {
            q_values.insert(state, 0.0);
            continue;
        }
        let (action, value) = best_action(world, values, state, gamma);
        policy.insert(state, action);
        q_values.insert(state, value);
    }

    (policy, q_values)
}

/// Everything produced by one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub policy: Policy,
    pub q_values: QValues,
    pub values: ValueFunction,
    pub path: PathTrace,
    pub iterations: usize,
    pub converged: bool,
}

impl Solution {
    pub fn reachable(&self) -> bool {
        self.path.reachable
    }
}

/// Value-iteration solver for deterministic grid worlds.
#[derive(Debug, Clone, Default)]
pub struct GridMdpSolver {
    config: SolverConfig,
}

impl GridMdpSolver {
    pub fn new(config: SolverConfig) -> Result<Self, SolveError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn solve(&self, world: &GridWorld) -> Solution {
        let ValueIteration {
            values,
            iterations,
            converged,
            ..
        } = value_iteration(world, &self.config);
        let (policy, q_values) = extract_policy(world, &values, self.config.gamma);
        let path = reconstruct_path(world, &policy);

        info!("value iteration finished, reachable = {}", path.reachable);

        Solution {
            policy,
            q_values,
            values,
            path,
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::WalkOutcome;

    const EPS: f64 = 1e-9;

    fn open_grid(size: usize) -> GridWorld {
        GridWorld::new(size, Cell::new(0, 0), Cell::new(size - 1, size - 1), []).unwrap()
    }

    #[test]
    fn config_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::default().gamma(1.0).validate().is_err());
        assert!(SolverConfig::default().gamma(-0.1).validate().is_err());
        assert!(SolverConfig::default().threshold(0.0).validate().is_err());
        assert!(SolverConfig::default().threshold(f64::NAN).validate().is_err());
        assert!(SolverConfig::default().max_iterations(0).validate().is_err());
        assert!(GridMdpSolver::new(SolverConfig::default().gamma(2.0)).is_err());

        let config = SolverConfig::default().gamma(0.5).max_iterations(10);
        let solver = GridMdpSolver::new(config).unwrap();
        assert_eq!(solver.config(), &config);
    }

    #[test]
    fn values_follow_discounted_distance() {
        let world = open_grid(3);
        let run = value_iteration(&world, &SolverConfig::default());
        assert!(run.converged);
        assert_eq!(run.iterations, 5);

        let v = |r, c| run.values.get(Cell::new(r, c)).unwrap();
        assert!((v(2, 2) - 0.0).abs() < EPS);
        assert!((v(2, 1) - 1.0).abs() < EPS);
        assert!((v(1, 1) - 0.9).abs() < EPS);
        assert!((v(0, 2) - 0.9).abs() < EPS);
        assert!((v(0, 1) - 0.81).abs() < EPS);
        assert!((v(0, 0) - 0.729).abs() < EPS);
    }

    #[test]
    fn goal_is_absorbing() {
        let world = GridWorld::new(
            4,
            Cell::new(0, 0),
            Cell::new(1, 2),
            [Cell::new(1, 1), Cell::new(2, 2)],
        )
        .unwrap();
        let solution = GridMdpSolver::default().solve(&world);
        assert_eq!(solution.q_values[&world.goal()], 0.0);
        assert!(!solution.policy.contains_key(&world.goal()));
        assert_eq!(solution.values.get(world.goal()), Some(0.0));
        assert_eq!(solution.values.get(Cell::new(1, 1)), None);
    }

    #[test]
    fn policy_covers_every_open_non_goal_cell() {
        let world = GridWorld::new(
            5,
            Cell::new(4, 0),
            Cell::new(0, 4),
            [Cell::new(2, 1), Cell::new(2, 2), Cell::new(2, 3)],
        )
        .unwrap();
        let solution = GridMdpSolver::default().solve(&world);
        assert_eq!(solution.policy.len(), world.states().len() - 1);
        assert_eq!(solution.q_values.len(), world.states().len());
        assert!(solution.q_values.values().all(|q| q.is_finite()));
    }

    #[test]
    fn q_values_grow_towards_goal_along_path() {
        let world = GridWorld::new(
            6,
            Cell::new(0, 0),
            Cell::new(5, 5),
            [Cell::new(1, 1), Cell::new(1, 2), Cell::new(3, 3), Cell::new(4, 3)],
        )
        .unwrap();
        let solution = GridMdpSolver::default().solve(&world);
        assert!(solution.reachable());

        let qs: Vec<f64> = solution.path.cells[..solution.path.cells.len() - 1]
            .iter()
            .map(|cell| solution.q_values[cell])
            .collect();
        for pair in qs.windows(2) {
            assert!(pair[0] <= pair[1] + EPS);
        }
        assert!(qs.iter().all(|q| *q > 0.0 && q.is_finite()));
    }

    #[test]
    fn ties_prefer_earlier_actions() {
        // From (0,0) both Down and Right lead one step closer.
        let world = open_grid(2);
        let solution = GridMdpSolver::default().solve(&world);
        assert_eq!(solution.policy[&Cell::new(0, 0)], Action::Down);
        assert_eq!(solution.policy[&Cell::new(1, 0)], Action::Right);
        assert_eq!(solution.policy[&Cell::new(0, 1)], Action::Down);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let world = open_grid(3);
        let config = SolverConfig::default().max_iterations(1);
        let run = value_iteration(&world, &config);
        assert!(!run.converged);
        assert_eq!(run.iterations, 1);
        assert_eq!(run.deltas.len(), 1);
        assert!((run.deltas[0] - 1.0).abs() < EPS);

        let solution = GridMdpSolver::new(config).unwrap().solve(&world);
        assert!(!solution.converged);
    }

    #[test]
    fn deltas_are_non_negative_and_terminate_on_large_grid() {
        let size = 50;
        let obstacles: Vec<Cell> = (0..size - 1)
            .step_by(2)
            .skip(1)
            .map(|row| Cell::new(row, size / 2))
            .collect();
        let world =
            GridWorld::new(size, Cell::new(0, 0), Cell::new(size - 1, size - 1), obstacles)
                .unwrap();
        let config = SolverConfig::default();
        let run = value_iteration(&world, &config);

        assert!(run.converged);
        assert!(run.iterations <= config.max_iterations);
        assert!(run.deltas.iter().all(|d| *d >= 0.0));
        assert!(*run.deltas.last().unwrap() < config.threshold);
    }

    #[test]
    fn solving_twice_is_bit_identical() {
        let world = GridWorld::new(
            7,
            Cell::new(6, 0),
            Cell::new(0, 6),
            [Cell::new(3, 0), Cell::new(3, 1), Cell::new(3, 2), Cell::new(3, 3)],
        )
        .unwrap();
        let solver = GridMdpSolver::default();
        let first = solver.solve(&world);
        let second = solver.solve(&world);

        assert_eq!(first.policy, second.policy);
        assert_eq!(first.path, second.path);
        for (a, b) in first.q_values.values().zip(second.q_values.values()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn isolated_start_gets_no_route() {
        // Start boxed in by obstacles; its only moves are bumps.
        let world = GridWorld::new(
            3,
            Cell::new(0, 0),
            Cell::new(2, 2),
            [Cell::new(0, 1), Cell::new(1, 0)],
        )
        .unwrap();
        let solution = GridMdpSolver::default().solve(&world);
        assert!(!solution.reachable());
        assert!(solution.q_values[&Cell::new(0, 0)] < 0.0);
        assert_eq!(solution.path.outcome, WalkOutcome::Blocked(Cell::new(0, 0)));
    }
}

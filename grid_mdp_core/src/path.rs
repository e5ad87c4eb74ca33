use std::collections::HashSet;

use crate::{Cell, GridWorld, solver::Policy};

/// Why a policy walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    ReachedGoal,
    /// The walk came back to this cell.
    Cycle(Cell),
    /// This cell has no policy entry.
    NoPolicy(Cell),
    /// The action chosen at this cell leaves the grid or hits an obstacle.
    Blocked(Cell),
}

/// Cells visited by greedily following a policy from the start.
///
/// When the goal is not reached the partial trace is kept for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTrace {
    pub cells: Vec<Cell>,
    pub reachable: bool,
    pub outcome: WalkOutcome,
}

/// Walks `policy` from the world's start until the goal, a revisit, a cell
/// without an action, or an invalid move.
///
/// Each step is re-validated against the grid instead of trusting the policy.
/// A revisited cell is appended once before the walk stops.
pub fn reconstruct_path(world: &GridWorld, policy: &Policy) -> PathTrace {
    let mut cells = Vec::new();
    let mut visited = HashSet::new();
    let mut current = world.start();

    let outcome = loop {
        cells.push(current);
        if current == world.goal() {
            break WalkOutcome::ReachedGoal;
        }
        if !visited.insert(current) {
            break WalkOutcome::Cycle(current);
        }

        let Some(&action) = policy.get(&current) else {
            break WalkOutcome::NoPolicy(current);
        };

        match current.neighbor(action) {
            Some(next) if world.is_open(next) => current = next,
            _ => break WalkOutcome::Blocked(current),
        }
    };

    PathTrace {
        cells,
        reachable: outcome == WalkOutcome::ReachedGoal,
        outcome,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Action, GridMdpSolver};

    #[test]
    fn start_on_goal_is_trivially_reachable() {
        let world = GridWorld::new(3, Cell::new(1, 1), Cell::new(1, 1), []).unwrap();
        let solution = GridMdpSolver::default().solve(&world);
        assert!(solution.reachable());
        assert_eq!(solution.path.cells, vec![Cell::new(1, 1)]);
        assert_eq!(solution.path.outcome, WalkOutcome::ReachedGoal);
    }

    #[test]
    fn two_cell_oscillation_terminates() {
        // S . #
        // # # .
        // . . G
        let world = GridWorld::new(
            3,
            Cell::new(0, 0),
            Cell::new(2, 2),
            [Cell::new(0, 2), Cell::new(1, 0), Cell::new(1, 1)],
        )
        .unwrap();
        let solution = GridMdpSolver::default().solve(&world);

        assert_eq!(solution.policy[&Cell::new(0, 0)], Action::Right);
        assert_eq!(solution.policy[&Cell::new(0, 1)], Action::Left);
        assert!(!solution.reachable());
        assert_eq!(
            solution.path.cells,
            vec![Cell::new(0, 0), Cell::new(0, 1), Cell::new(0, 0)]
        );
        assert_eq!(solution.path.outcome, WalkOutcome::Cycle(Cell::new(0, 0)));
    }

    #[test]
    fn walled_off_goal_is_unreachable() {
        // G # .
        // # . .
        // . . S
        let world = GridWorld::new(
            3,
            Cell::new(2, 2),
            Cell::new(0, 0),
            [Cell::new(0, 1), Cell::new(1, 0)],
        )
        .unwrap();
        let solution = GridMdpSolver::default().solve(&world);

        assert!(!solution.reachable());
        assert_eq!(solution.path.cells.first(), Some(&world.start()));
        assert!(!solution.path.cells.contains(&world.goal()));
        assert_eq!(
            solution.path.cells,
            vec![
                Cell::new(2, 2),
                Cell::new(1, 2),
                Cell::new(0, 2),
                Cell::new(1, 2)
            ]
        );
        assert_eq!(solution.path.outcome, WalkOutcome::Cycle(Cell::new(1, 2)));
    }

    #[test]
    fn missing_policy_entry_stops_walk() {
        let world = GridWorld::new(3, Cell::new(0, 0), Cell::new(2, 2), []).unwrap();
        let trace = reconstruct_path(&world, &Policy::new());
        assert!(!trace.reachable);
        assert_eq!(trace.cells, vec![Cell::new(0, 0)]);
        assert_eq!(trace.outcome, WalkOutcome::NoPolicy(Cell::new(0, 0)));
    }

    #[test]
    fn invalid_moves_are_revalidated() {
        let world =
            GridWorld::new(3, Cell::new(0, 0), Cell::new(2, 2), [Cell::new(0, 2)]).unwrap();

        let mut policy = Policy::new();
        policy.insert(Cell::new(0, 0), Action::Right);
        policy.insert(Cell::new(0, 1), Action::Right);
        let trace = reconstruct_path(&world, &policy);
        assert_eq!(trace.cells, vec![Cell::new(0, 0), Cell::new(0, 1)]);
        assert_eq!(trace.outcome, WalkOutcome::Blocked(Cell::new(0, 1)));

        let mut policy = Policy::new();
        policy.insert(Cell::new(0, 0), Action::Up);
        let trace = reconstruct_path(&world, &policy);
        assert_eq!(trace.outcome, WalkOutcome::Blocked(Cell::new(0, 0)));
        assert!(!trace.reachable);
    }
}

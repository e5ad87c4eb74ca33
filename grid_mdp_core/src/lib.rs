use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod map;
pub mod path;
pub mod solver;
pub mod wire;
pub mod world;

pub use error::SolveError;
pub use path::{PathTrace, WalkOutcome};
pub use solver::{GridMdpSolver, Solution, SolverConfig};
pub use world::{Action, GridWorld};

/// Represents a 2D coordinate on a square grid.
///
/// Ordering is row-major, so ordered maps keyed by `Cell` iterate the grid
/// the same way the state space is enumerated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Cell { row, col }
    }

    /// Returns the neighbouring cell reached by `action`.
    ///
    /// Returns `None` when the move would leave the non-negative quadrant;
    /// upper bounds are checked by the caller, which knows the grid size.
    pub fn neighbor(self, action: Action) -> Option<Cell> {
        let (dr, dc) = action.offset();
        Some(Cell {
            row: self.row.checked_add_signed(dr)?,
            col: self.col.checked_add_signed(dc)?,
        })
    }

    /// 1-based row-major index used by external callers: `row * grid_size + col + 1`.
    pub fn index(self, grid_size: usize) -> usize {
        self.row * grid_size + self.col + 1
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Solves a square grid with the default [`SolverConfig`].
///
/// This is the core entry point: it validates the grid, runs value
/// iteration, extracts the greedy policy and traces the path from `start`.
pub fn solve<I>(
    grid_size: usize,
    start: Cell,
    goal: Cell,
    obstacles: I,
) -> Result<Solution, SolveError>
where
    I: IntoIterator<Item = Cell>,
{
    let world = GridWorld::new(grid_size, start, goal, obstacles)?;
    Ok(GridMdpSolver::default().solve(&world))
}

//! External request/response shapes.
//!
//! Cells travel as `{ "row": r, "col": c }` on the way in and as 1-based
//! row-major indices (see [`Cell::index`]) on the way out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Action, Cell, GridWorld, Solution, SolveError};

/// A grid to solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    pub grid_size: usize,
    pub start_pos: Cell,
    pub goal_pos: Cell,
    #[serde(default)]
    pub obstacles: Vec<Cell>,
}

impl TrainRequest {
    pub fn to_world(&self) -> Result<GridWorld, SolveError> {
        GridWorld::new(
            self.grid_size,
            self.start_pos,
            self.goal_pos,
            self.obstacles.iter().copied(),
        )
    }
}

/// A solved grid, keyed by cell index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainResponse {
    pub policy: BTreeMap<usize, Action>,
    pub q_values: BTreeMap<usize, f64>,
    pub path: Vec<usize>,
    pub reachable: bool,
    pub converged: bool,
    pub iterations: usize,
}

impl TrainResponse {
    pub fn from_solution(solution: &Solution, grid_size: usize) -> Self {
        let index = |cell: &Cell| cell.index(grid_size);
        Self {
            policy: solution
                .policy
                .iter()
                .map(|(cell, action)| (index(cell), *action))
                .collect(),
            q_values: solution
                .q_values
                .iter()
                .map(|(cell, q)| (index(cell), *q))
                .collect(),
            path: solution.path.cells.iter().map(index).collect(),
            reachable: solution.reachable(),
            converged: solution.converged,
            iterations: solution.iterations,
        }
    }
}

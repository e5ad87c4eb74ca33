use std::fmt;

use crate::{Cell, map::GridError, world::MAX_GRID_SIZE};

/// Which endpoint of the walk a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    Goal,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::Goal => write!(f, "goal"),
        }
    }
}

/// Invalid input rejected before any value iteration runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("grid size must be positive")]
    InvalidGridSize,
    #[error("grid size {grid_size} exceeds the maximum of {max}")]
    GridTooLarge { grid_size: usize, max: usize },
    #[error("cell {cell} is outside a {grid_size}x{grid_size} grid")]
    OutOfBounds { cell: Cell, grid_size: usize },
    #[error("{role} cell {cell} is an obstacle")]
    ObstacleAtEndpoint { role: Endpoint, cell: Cell },
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid map: {0}")]
    MapFormat(String),
    #[error("invalid action code '{0}'")]
    InvalidAction(String),
}

impl SolveError {
    pub(crate) fn from_grid(err: GridError, grid_size: usize) -> Self {
        match err {
            GridError::OutOfBounds { row, col, .. } => SolveError::OutOfBounds {
                cell: Cell { row, col },
                grid_size,
            },
            GridError::TooLarge { .. } => SolveError::GridTooLarge {
                grid_size,
                max: MAX_GRID_SIZE,
            },
        }
    }
}

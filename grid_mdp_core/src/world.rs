use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    Cell,
    error::{Endpoint, SolveError},
    map::Grid,
};

/// Reward for bumping into the grid edge or an obstacle.
pub const BUMP_REWARD: f64 = -1.0;
/// Reward for stepping onto the goal.
pub const GOAL_REWARD: f64 = 1.0;
/// Largest accepted side length. Value iteration is quadratic in cells per
/// sweep, so anything bigger is rejected before allocating.
pub const MAX_GRID_SIZE: usize = 1024;

/// Represents the static type of a cell in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tile {
    #[default]
    Open,
    Obstacle,
}

/// The four unit moves an agent can take.
///
/// The declaration order is the evaluation order of the solver; ties between
/// equally good actions resolve to the one listed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "U")]
    Up,
    #[serde(rename = "D")]
    Down,
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// `(d_row, d_col)` unit offset of this action.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
        }
    }

    /// Single-character wire code.
    pub fn code(self) -> char {
        match self {
            Action::Up => 'U',
            Action::Down => 'D',
            Action::Left => 'L',
            Action::Right => 'R',
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Action {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "U" => Ok(Action::Up),
            "D" => Ok(Action::Down),
            "L" => Ok(Action::Left),
            "R" => Ok(Action::Right),
            _ => Err(SolveError::InvalidAction(s.to_string())),
        }
    }
}

/// Outcome of a single deterministic move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: Cell,
    pub reward: f64,
}

/// Collects every open cell of `tiles` in row-major order.
///
/// An all-obstacle grid yields an empty state space.
pub fn build_state_space(tiles: &Grid<Tile>) -> Vec<Cell> {
    tiles
        .enumerate()
        .filter_map(|(cell, tile)| (*tile == Tile::Open).then_some(cell))
        .collect()
}

/// A validated square grid: size, obstacles, start and goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GridWorld {
    tiles: Grid<Tile>,
    start: Cell,
    goal: Cell,
    states: Vec<Cell>,
}

impl GridWorld {
    /// Builds a world, rejecting a zero or oversized grid, endpoints or
    /// obstacles outside the grid, and obstacles placed on the start or goal cell.
    pub fn new<I>(grid_size: usize, start: Cell, goal: Cell, obstacles: I) -> Result<Self, SolveError>
    where
        I: IntoIterator<Item = Cell>,
    {
        if grid_size == 0 {
            return Err(SolveError::InvalidGridSize);
        }
        if grid_size > MAX_GRID_SIZE {
            return Err(SolveError::GridTooLarge {
                grid_size,
                max: MAX_GRID_SIZE,
            });
        }

        let mut tiles = Grid::filled(grid_size, grid_size, Tile::Open)
            .map_err(|err| SolveError::from_grid(err, grid_size))?;
        for cell in [start, goal] {
            if !tiles.contains(cell) {
                return Err(SolveError::OutOfBounds { cell, grid_size });
            }
        }
        for obstacle in obstacles {
            tiles
                .set(obstacle, Tile::Obstacle)
                .map_err(|err| SolveError::from_grid(err, grid_size))?;
        }

        for (role, cell) in [(Endpoint::Start, start), (Endpoint::Goal, goal)] {
            if tiles[cell] == Tile::Obstacle {
                return Err(SolveError::ObstacleAtEndpoint { role, cell });
            }
        }

        let states = build_state_space(&tiles);
        Ok(GridWorld {
            tiles,
            start,
            goal,
            states,
        })
    }

    pub fn size(&self) -> usize {
        self.tiles.rows()
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn goal(&self) -> Cell {
        self.goal
    }

    pub fn tiles(&self) -> &Grid<Tile> {
        &self.tiles
    }

    /// Non-obstacle cells in row-major order.
    pub fn states(&self) -> &[Cell] {
        &self.states
    }

    pub fn is_obstacle(&self, cell: Cell) -> bool {
        matches!(self.tiles.get(cell), Some(Tile::Obstacle))
    }

    /// True when `cell` is inside the grid and not an obstacle.
    pub fn is_open(&self, cell: Cell) -> bool {
        matches!(self.tiles.get(cell), Some(Tile::Open))
    }

    /// Deterministic transition and reward model.
    ///
    /// The goal is absorbing with zero reward. Moves off the grid or into an
    /// obstacle leave the agent in place with [`BUMP_REWARD`]; arriving at the
    /// goal pays [`GOAL_REWARD`]; any other move pays nothing.
    pub fn step(&self, state: Cell, action: Action) -> Transition {
        if state == self.goal {
            return Transition {
                next: state,
                reward: 0.0,
            };
        }

        match state.neighbor(action) {
            Some(next) if self.is_open(next) => Transition {
                next,
                reward: if next == self.goal { GOAL_REWARD } else { 0.0 },
            },
            _ => Transition {
                next: state,
                reward: BUMP_REWARD,
            },
        }
    }
}

/// Loads a world from a whitespace-separated token map.
///
/// Tokens: `ST` start, `GL` goal, `WL`/`WA` obstacle, `BL` open floor.
/// The map must be square and contain exactly one start and one goal.
pub fn load_world_from_string(map_string: &str) -> Result<GridWorld, SolveError> {
    let lines: Vec<&str> = map_string.trim().lines().collect();
    if lines.is_empty() {
        return Err(SolveError::MapFormat("map string is empty".to_string()));
    }

    let size = lines.len();
    let mut start = None;
    let mut goal = None;
    let mut obstacles = Vec::new();

    for (row, line) in lines.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != size {
            return Err(SolveError::MapFormat(format!(
                "row {} has {} cells, expected {} for a square map",
                row,
                tokens.len(),
                size
            )));
        }

        for (col, token) in tokens.iter().enumerate() {
            let cell = Cell { row, col };
            match *token {
                "ST" => {
                    if start.replace(cell).is_some() {
                        return Err(SolveError::MapFormat(
                            "multiple start cells ('ST') found".to_string(),
                        ));
                    }
                }
                "GL" => {
                    if goal.replace(cell).is_some() {
                        return Err(SolveError::MapFormat(
                            "multiple goal cells ('GL') found".to_string(),
                        ));
                    }
                }
                "WL" | "WA" => obstacles.push(cell),
                "BL" => {}
                unknown => {
                    return Err(SolveError::MapFormat(format!(
                        "unknown map code '{}' at ({}, {})",
                        unknown, row, col
                    )));
                }
            }
        }
    }

    let start =
        start.ok_or_else(|| SolveError::MapFormat("no start cell ('ST') found".to_string()))?;
    let goal = goal.ok_or_else(|| SolveError::MapFormat("no goal cell ('GL') found".to_string()))?;

    GridWorld::new(size, start, goal, obstacles)
}

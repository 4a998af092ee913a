use serde::{Deserialize, Serialize};

pub mod bot;
pub mod config;
pub mod dataset;
pub mod episode;
pub mod generator;
pub mod grid;
pub mod pathfinding;
pub mod scores;
pub mod session;

/// Represents a 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Returns the manhattan distance between two positions.
    pub fn manhattan(&self, other: &Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns the neighbouring position in `direction`, or `None` if it would
    /// leave a `size` x `size` grid.
    pub fn step(&self, direction: Direction, size: usize) -> Option<Position> {
        let (dx, dy) = direction.delta();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        (x < size && y < size).then_some(Position { x, y })
    }
}

/// One of the four cardinal moves. Screen coordinates: `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Converts a move between two adjacent positions into a direction.
    ///
    /// Returns `None` unless exactly one axis differs by exactly one cell.
    pub fn between(src: &Position, dst: &Position) -> Option<Direction> {
        let dx = dst.x as isize - src.x as isize;
        let dy = dst.y as isize - src.y as isize;

        match (dx, dy) {
            (0, -1) => Some(Direction::Up),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }
}

/// A discrete action as recorded in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Move(Direction),
    CollectOrDeliver,
}

impl Action {
    /// Dataset action code: 0=up, 1=down, 2=left, 3=right, 4=collect-or-deliver.
    pub fn code(self) -> u8 {
        match self {
            Action::Move(Direction::Up) => 0,
            Action::Move(Direction::Down) => 1,
            Action::Move(Direction::Left) => 2,
            Action::Move(Direction::Right) => 3,
            Action::CollectOrDeliver => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Action> {
        match code {
            0 => Some(Action::Move(Direction::Up)),
            1 => Some(Action::Move(Direction::Down)),
            2 => Some(Action::Move(Direction::Left)),
            3 => Some(Action::Move(Direction::Right)),
            4 => Some(Action::CollectOrDeliver),
            _ => None,
        }
    }
}

/// The two resource tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Normal,
    Golden,
}

/// A collectable resource lying on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub position: Position,
    pub kind: ResourceKind,
    /// Score granted on delivery.
    pub value: u32,
}

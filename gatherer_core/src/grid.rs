use serde::{Deserialize, Serialize};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![T::default(); size],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Converts a position to a flat vector index.
    ///
    /// Returns `None` if the position is out of bounds.
    #[inline]
    fn index_of(&self, pos: Position) -> Option<usize> {
        self.contains(pos).then(|| pos.y * self.width + pos.x)
    }

    /// Checks if the given position is within the grid boundaries.
    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Gets an immutable reference to the cell at `pos`, or `None` out of bounds.
    pub fn get(&self, pos: Position) -> Option<&T> {
        self.index_of(pos).and_then(|index| self.cells.get(index))
    }

    /// Sets the value of the cell at `pos`.
    pub fn set(&mut self, pos: Position, value: T) -> Result<(), GridError> {
        let index = self.index_of(pos).ok_or(GridError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| (Position::new(index % width, index / width), cell))
    }
}

/// Movement class of a single cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Normal,
    /// Passable, but entering it costs the hindered penalty.
    Hindered,
}

/// Terrain overlay of a square episode grid: which cells are hindered and
/// what entering each class of cell costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terrain {
    tiles: Grid<Tile>,
    normal_cost: u32,
    hindered_cost: u32,
}

impl Terrain {
    /// Creates an all-normal `size` x `size` terrain.
    pub fn new(size: usize, normal_cost: u32, hindered_cost: u32) -> Self {
        Terrain {
            tiles: Grid::new(size, size),
            normal_cost,
            hindered_cost,
        }
    }

    /// Creates a terrain with the given cells marked as hindered.
    pub fn with_hindered<I>(
        size: usize,
        normal_cost: u32,
        hindered_cost: u32,
        hindered: I,
    ) -> Result<Self, GridError>
    where
        I: IntoIterator<Item = Position>,
    {
        let mut terrain = Terrain::new(size, normal_cost, hindered_cost);
        for pos in hindered {
            terrain.set_hindered(pos)?;
        }
        Ok(terrain)
    }

    pub fn set_hindered(&mut self, pos: Position) -> Result<(), GridError> {
        self.tiles.set(pos, Tile::Hindered)
    }

    /// Side length of the grid.
    #[inline]
    pub fn size(&self) -> usize {
        self.tiles.width()
    }

    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        self.tiles.contains(pos)
    }

    pub fn tile(&self, pos: Position) -> Option<Tile> {
        self.tiles.get(pos).copied()
    }

    pub fn is_hindered(&self, pos: Position) -> bool {
        self.tile(pos) == Some(Tile::Hindered)
    }

    /// Cost of stepping onto `pos`, or `None` if it is off the grid.
    pub fn entry_cost(&self, pos: Position) -> Option<u32> {
        self.tile(pos).map(|tile| match tile {
            Tile::Normal => self.normal_cost,
            Tile::Hindered => self.hindered_cost,
        })
    }

    /// Cheapest possible single step; scales the search heuristic.
    pub fn min_step_cost(&self) -> u32 {
        self.normal_cost.min(self.hindered_cost)
    }

    /// All hindered cells in row-major order.
    pub fn hindered_positions(&self) -> Vec<Position> {
        self.tiles
            .enumerate()
            .filter(|(_, tile)| **tile == Tile::Hindered)
            .map(|(pos, _)| pos)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_out_of_bounds_is_an_error() {
        let mut grid: Grid<u8> = Grid::new(3, 2);
        assert!(grid.set(Position::new(2, 1), 7).is_ok());
        assert_eq!(grid.get(Position::new(2, 1)), Some(&7));
        assert_eq!(grid.get(Position::new(0, 2)), None);
        assert_eq!(
            grid.set(Position::new(3, 0), 1),
            Err(GridError::OutOfBounds {
                x: 3,
                y: 0,
                width: 3,
                height: 2
            })
        );
    }

    #[test]
    fn enumerate_walks_row_major() {
        let grid: Grid<u8> = Grid::new(2, 2);
        let positions: Vec<Position> = grid.enumerate().map(|(pos, _)| pos).collect();
        assert_eq!(
            positions,
            vec![
                Position::new(0, 0),
                Position::new(1, 0),
                Position::new(0, 1),
                Position::new(1, 1)
            ]
        );
    }

    #[test]
    fn entry_cost_follows_tile_class() {
        let mud = Position::new(1, 1);
        let terrain = Terrain::with_hindered(4, 1, 5, [mud]).unwrap();

        assert_eq!(terrain.entry_cost(Position::new(0, 0)), Some(1));
        assert_eq!(terrain.entry_cost(mud), Some(5));
        assert_eq!(terrain.entry_cost(Position::new(4, 0)), None);
        assert_eq!(terrain.hindered_positions(), vec![mud]);
        assert_eq!(terrain.min_step_cost(), 1);
    }

    #[test]
    fn hindered_outside_grid_is_rejected() {
        let result = Terrain::with_hindered(2, 1, 5, [Position::new(2, 2)]);
        assert!(matches!(result, Err(GridError::OutOfBounds { .. })));
    }
}

//! Hex board geometry.
//!
//! Cells sit on a `size x size` grid. Columns are `COLUMN_SPACING` apart
//! along X; odd columns are shifted half a cell along Z so that every cell
//! touches up to six neighbours within [`NEIGHBOUR_RADIUS`].

use serde::{Deserialize, Serialize};
use sotf_types::Vec3;

/// Distance between adjacent columns along X.
pub const COLUMN_SPACING: f64 = 0.85;

/// Maximum centre distance at which two cells count as neighbours.
pub const NEIGHBOUR_RADIUS: f64 = 1.175_83;

/// Vertical offset between stacked pieces on one cell.
pub const STACK_STEP: f64 = 0.16;

/// Prefix of generated cell names.
const CELL_PREFIX: &str = "FieldChip";

/// Row / column position of a cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridCoord {
    /// Row index, `0..size`.
    pub row: u32,
    /// Column index, `0..size`.
    pub col: u32,
}

impl GridCoord {
    /// Create a coordinate.
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    const fn is_odd_column(self) -> bool {
        self.col & 1 == 1
    }
}

/// Board dimensions and per-cell capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    /// Cells per row and per column.
    pub size: u32,
    /// Maximum pieces per cell.
    pub capacity: usize,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            size: 10,
            capacity: 5,
        }
    }
}

impl BoardLayout {
    /// Create a layout.
    pub const fn new(size: u32, capacity: usize) -> Self {
        Self { size, capacity }
    }

    /// Total number of cells on the board.
    pub const fn cell_count(self) -> u32 {
        self.size.saturating_mul(self.size)
    }

    fn half(self) -> f64 {
        f64::from(self.size) / 2.0
    }

    /// Every coordinate on the board, row-major.
    pub fn coords(self) -> impl Iterator<Item = GridCoord> {
        let size = self.size;
        (0..size).flat_map(move |row| (0..size).map(move |col| GridCoord::new(row, col)))
    }

    /// Whether `coord` lies on the board.
    pub const fn contains(self, coord: GridCoord) -> bool {
        coord.row < self.size && coord.col < self.size
    }

    /// Name of the cell generated at `coord`.
    pub fn cell_name(coord: GridCoord) -> String {
        format!("{CELL_PREFIX}{}_{}", coord.row, coord.col)
    }

    /// Coordinate encoded in a generated cell name, if it is one.
    pub fn coord_from_name(name: &str) -> Option<GridCoord> {
        let rest = name.strip_prefix(CELL_PREFIX)?;
        let (row, col) = rest.split_once('_')?;
        Some(GridCoord::new(row.parse().ok()?, col.parse().ok()?))
    }

    /// World position of the cell at `coord`.
    pub fn position(self, coord: GridCoord) -> Vec3 {
        let half = self.half();
        let x = f64::from(coord.col).mul_add(COLUMN_SPACING, -half);
        let z = if coord.is_odd_column() {
            f64::from(coord.row) - (half + 0.5)
        } else {
            f64::from(coord.row) - half
        };
        Vec3::new(x, 0.0, z)
    }

    /// Grid coordinate of a cell centred at `position`, if it lies on the board.
    pub fn coord_of(self, position: Vec3) -> Option<GridCoord> {
        let half = self.half();
        let col = ((position.x + half) / COLUMN_SPACING).round();
        if !(0.0..f64::from(self.size)).contains(&col) {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let col = col as u32;
        let offset = if col & 1 == 1 { half + 0.5 } else { half };
        let row = (position.z + offset).round();
        if !(0.0..f64::from(self.size)).contains(&row) {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let row = row as u32;
        Some(GridCoord::new(row, col))
    }
}

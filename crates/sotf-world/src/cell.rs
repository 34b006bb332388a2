//! A single territory cell.

use sotf_types::{TerrainKind, Vec3};

use crate::layout::{GridCoord, STACK_STEP};

/// A terrain cell and the pieces standing on it, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Stable name; also the key remote actions address the cell by.
    pub name: String,
    /// Terrain kind.
    pub terrain: TerrainKind,
    /// Centre of the cell in world space.
    pub position: Vec3,
    /// Board coordinate, when the position maps onto the grid.
    pub coord: Option<GridCoord>,
    /// Maximum number of residents.
    pub capacity: usize,
    residents: Vec<String>,
}

impl Cell {
    /// Create an empty cell.
    pub fn new(name: impl Into<String>, terrain: TerrainKind, position: Vec3, capacity: usize) -> Self {
        Self {
            name: name.into(),
            terrain,
            position,
            coord: None,
            capacity,
            residents: Vec::new(),
        }
    }

    /// Names of the pieces on this cell, in arrival order.
    pub fn residents(&self) -> &[String] {
        &self.residents
    }

    /// Number of resident pieces.
    pub fn len(&self) -> usize {
        self.residents.len()
    }

    /// Whether no piece stands on this cell.
    pub fn is_empty(&self) -> bool {
        self.residents.is_empty()
    }

    /// Whether the cell has reached its capacity.
    pub fn is_full(&self) -> bool {
        self.residents.len() >= self.capacity
    }

    /// Whether `piece` stands on this cell.
    pub fn contains(&self, piece: &str) -> bool {
        self.residents.iter().any(|r| r == piece)
    }

    /// Append a resident. Returns `false` if it is already here.
    pub(crate) fn push(&mut self, piece: &str) -> bool {
        if self.contains(piece) {
            return false;
        }
        self.residents.push(piece.to_owned());
        true
    }

    /// Remove a resident, keeping the order of the rest.
    pub(crate) fn remove(&mut self, piece: &str) -> bool {
        let before = self.residents.len();
        self.residents.retain(|r| r != piece);
        self.residents.len() != before
    }

    /// Where the resident at `slot` is drawn: stacked above the centre.
    pub fn stack_position(&self, slot: usize) -> Vec3 {
        let slot = f64::from(u32::try_from(slot).unwrap_or(u32::MAX));
        Vec3::new(self.position.x, STACK_STEP * slot, self.position.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residents_keep_arrival_order() {
        let mut cell = Cell::new("FieldChip0_0", TerrainKind::Forest, Vec3::default(), 3);
        assert!(cell.push("a"));
        assert!(cell.push("b"));
        assert!(!cell.push("a"));
        assert!(cell.push("c"));
        assert!(cell.is_full());
        assert!(cell.remove("b"));
        assert_eq!(cell.residents(), ["a".to_owned(), "c".to_owned()]);
        assert!(!cell.remove("b"));
    }

    #[test]
    fn stack_positions_step_upwards() {
        let cell = Cell::new("c", TerrainKind::Water, Vec3::new(1.0, 0.0, 2.0), 5);
        let third = cell.stack_position(2);
        assert!((third.y - 0.32).abs() < 1e-9);
        assert!((third.x - 1.0).abs() < 1e-9);
        assert!((third.z - 2.0).abs() < 1e-9);
    }
}

//! The cell and piece registry.
//!
//! [`Territory`] owns every cell and piece of a session. Cells are created
//! once during setup and never removed; eliminated pieces stay registered in
//! the [`PieceState::Eliminated`] state so late actions naming them still
//! resolve (and are then ignored).
//!
//! Both registries keep insertion order: nearest-cell ties resolve to the
//! earlier cell, and held terrain kinds are reported in first-seen order.

use std::collections::BTreeMap;

use sotf_mutation::{Axis, TraitChain};
use sotf_types::{TerrainKind, Vec3};
use tracing::debug;

use crate::cell::Cell;
use crate::error::WorldError;
use crate::layout::{BoardLayout, GridCoord, NEIGHBOUR_RADIUS};
use crate::piece::{Piece, PieceState};

/// Every cell and piece of a session.
#[derive(Debug, Clone, Default)]
pub struct Territory {
    layout: BoardLayout,
    cells: Vec<Cell>,
    cell_index: BTreeMap<String, usize>,
    pieces: Vec<Piece>,
    piece_index: BTreeMap<String, usize>,
}

impl Territory {
    /// Create an empty territory for a board of the given layout.
    pub const fn new(layout: BoardLayout) -> Self {
        Self {
            layout,
            cells: Vec::new(),
            cell_index: BTreeMap::new(),
            pieces: Vec::new(),
            piece_index: BTreeMap::new(),
        }
    }

    /// The board layout.
    pub const fn layout(&self) -> BoardLayout {
        self.layout
    }

    // -------------------------------------------------------------------
    // Cells
    // -------------------------------------------------------------------

    /// Add a cell. Its grid coordinate is derived from its position.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateCell`] if the name is taken.
    pub fn add_cell(
        &mut self,
        name: &str,
        terrain: TerrainKind,
        position: Vec3,
    ) -> Result<&Cell, WorldError> {
        if self.cell_index.contains_key(name) {
            return Err(WorldError::DuplicateCell(name.to_owned()));
        }
        let mut cell = Cell::new(name, terrain, position, self.layout.capacity);
        cell.coord = self
            .layout
            .coord_of(position)
            .or_else(|| BoardLayout::coord_from_name(name));
        let index = self.cells.len();
        self.cells.push(cell);
        self.cell_index.insert(name.to_owned(), index);
        self.cells.get(index).ok_or_else(|| WorldError::CellNotFound(name.to_owned()))
    }

    /// Look a cell up by name.
    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.cell_index.get(name).and_then(|i| self.cells.get(*i))
    }

    /// Look a cell up by name for a field update.
    pub fn cell_mut(&mut self, name: &str) -> Option<&mut Cell> {
        let index = *self.cell_index.get(name)?;
        self.cells.get_mut(index)
    }

    /// All cells in creation order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells grouped by board row, each row ordered by column.
    ///
    /// Cells without a grid coordinate are left out.
    pub fn rows(&self) -> Vec<Vec<&Cell>> {
        let mut rows: BTreeMap<u32, Vec<&Cell>> = BTreeMap::new();
        for cell in &self.cells {
            if let Some(coord) = cell.coord {
                rows.entry(coord.row).or_default().push(cell);
            }
        }
        rows.into_values()
            .map(|mut row| {
                row.sort_by_key(|c| c.coord.map(|k| k.col));
                row
            })
            .collect()
    }

    /// The cell at a grid coordinate.
    pub fn cell_at(&self, coord: GridCoord) -> Option<&Cell> {
        self.cells.iter().find(|c| c.coord == Some(coord))
    }

    /// Grid coordinate of the named cell.
    pub fn coord_of(&self, name: &str) -> Option<GridCoord> {
        self.cell(name).and_then(|c| c.coord)
    }

    /// The cell whose centre is closest to `position`.
    pub fn nearest_cell(&self, position: Vec3) -> Option<&Cell> {
        let mut best: Option<(&Cell, f64)> = None;
        for cell in &self.cells {
            let distance = cell.position.distance(position);
            match best {
                Some((_, d)) if distance >= d => {}
                _ => best = Some((cell, distance)),
            }
        }
        best.map(|(cell, _)| cell)
    }

    /// Cells adjacent to the named cell, in creation order.
    pub fn neighbours(&self, name: &str) -> Vec<&Cell> {
        let Some(centre) = self.cell(name) else {
            return Vec::new();
        };
        self.cells
            .iter()
            .filter(|c| {
                let d = c.position.distance(centre.position);
                d > 0.0 && d <= NEIGHBOUR_RADIUS
            })
            .collect()
    }

    /// Whether `b` is one of the cells around `a`.
    pub fn is_adjacent(&self, a: &str, b: &str) -> bool {
        self.neighbours(a).iter().any(|c| c.name == b)
    }

    // -------------------------------------------------------------------
    // Pieces
    // -------------------------------------------------------------------

    /// Register an unplaced piece.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicatePiece`] if the name is taken.
    pub fn add_piece(&mut self, piece: Piece) -> Result<(), WorldError> {
        if self.piece_index.contains_key(&piece.name) {
            return Err(WorldError::DuplicatePiece(piece.name));
        }
        self.piece_index.insert(piece.name.clone(), self.pieces.len());
        self.pieces.push(piece);
        Ok(())
    }

    /// Look a piece up by name.
    pub fn piece(&self, name: &str) -> Option<&Piece> {
        self.piece_index.get(name).and_then(|i| self.pieces.get(*i))
    }

    /// Look a piece up by name for modification.
    pub fn piece_mut(&mut self, name: &str) -> Option<&mut Piece> {
        let index = *self.piece_index.get(name)?;
        self.pieces.get_mut(index)
    }

    /// All pieces, including eliminated ones, in creation order.
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.iter()
    }

    /// Live pieces of one owner.
    pub fn pieces_of<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Piece> + 'a {
        self.pieces.iter().filter(move |p| p.is_alive() && p.owner == owner)
    }

    /// The cell a piece stands on: its cached cell, or the nearest one.
    pub fn cell_of_piece(&self, name: &str) -> Option<&Cell> {
        let piece = self.piece(name)?;
        if !piece.is_alive() {
            return None;
        }
        piece
            .cell()
            .and_then(|c| self.cell(c))
            .or_else(|| self.nearest_cell(piece.position))
    }

    /// How many pieces of `owner` stand on the named cell.
    pub fn owned_on(&self, cell: &str, owner: &str) -> usize {
        self.cell(cell).map_or(0, |c| {
            c.residents()
                .iter()
                .filter(|r| self.piece(r).is_some_and(|p| p.owner == owner))
                .count()
        })
    }

    /// Distinct terrain kinds under the owner's live pieces, first-seen order.
    pub fn held_kinds(&self, owner: &str) -> Vec<TerrainKind> {
        let mut kinds = Vec::new();
        let placed = self
            .pieces_of(owner)
            .filter_map(|p| p.cell().and_then(|c| self.cell(c)));
        for cell in placed {
            if !kinds.contains(&cell.terrain) {
                kinds.push(cell.terrain);
            }
        }
        kinds
    }

    /// A piece's rating on a cell along one axis.
    pub fn rating(&self, piece: &str, cell: &str, axis: Axis) -> f64 {
        match (self.piece(piece), self.cell(cell)) {
            (Some(p), Some(c)) => p.chain.aggregate(axis, c.terrain),
            _ => 0.0,
        }
    }

    /// Replace the chain of every live piece of `owner`.
    ///
    /// Returns the number of pieces touched.
    pub fn update_chains(&mut self, owner: &str, f: impl Fn(&TraitChain) -> TraitChain) -> usize {
        let mut touched: usize = 0;
        for piece in self.pieces.iter_mut().filter(|p| p.is_alive() && p.owner == owner) {
            piece.chain = f(&piece.chain);
            touched = touched.saturating_add(1);
        }
        touched
    }

    // -------------------------------------------------------------------
    // Placement
    // -------------------------------------------------------------------

    /// Check whether `piece` may move onto `target`.
    ///
    /// A placed piece only reaches its neighbouring cells; an unplaced one
    /// may enter anywhere.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotAdjacent`] if the target is out of reach,
    /// [`WorldError::CellFull`] at capacity, [`WorldError::SameOwnerPresent`]
    /// if the target already holds a piece of the same owner.
    pub fn check_move(&self, piece: &str, target: &str) -> Result<(), WorldError> {
        let p = self.live_piece(piece)?;
        let cell = self
            .cell(target)
            .ok_or_else(|| WorldError::CellNotFound(target.to_owned()))?;
        let out_of_reach = p
            .cell()
            .filter(|origin| *origin != target && !self.is_adjacent(origin, target));
        if let Some(origin) = out_of_reach {
            return Err(WorldError::NotAdjacent {
                piece: p.name.clone(),
                from: origin.to_owned(),
                to: target.to_owned(),
            });
        }
        if cell.is_full() {
            return Err(WorldError::CellFull {
                cell: cell.name.clone(),
                capacity: cell.capacity,
            });
        }
        if self.owned_on(target, &p.owner) > 0 {
            return Err(WorldError::SameOwnerPresent {
                cell: cell.name.clone(),
                owner: p.owner.clone(),
            });
        }
        Ok(())
    }

    /// Move a piece onto `target`, leaving its current cell.
    ///
    /// The old cell's remaining residents are re-stacked in arrival order.
    pub fn move_piece(&mut self, piece: &str, target: &str) -> Result<(), WorldError> {
        self.check_move(piece, target)?;
        self.put(piece, target)
    }

    /// Put a piece onto `cell`, checking capacity only.
    ///
    /// Used for spawned pieces and offspring, which may join their own kind.
    pub fn settle(&mut self, piece: &str, cell: &str) -> Result<(), WorldError> {
        self.live_piece(piece)?;
        let target = self
            .cell(cell)
            .ok_or_else(|| WorldError::CellNotFound(cell.to_owned()))?;
        if target.is_full() {
            return Err(WorldError::CellFull {
                cell: target.name.clone(),
                capacity: target.capacity,
            });
        }
        self.put(piece, cell)
    }

    /// Take a piece out of play.
    pub fn eliminate(&mut self, piece: &str) -> Result<(), WorldError> {
        self.live_piece(piece)?;
        self.vacate(piece);
        if let Some(p) = self.piece_mut(piece) {
            p.state = PieceState::Eliminated;
        }
        debug!(piece = piece, "Piece eliminated");
        Ok(())
    }

    fn live_piece(&self, name: &str) -> Result<&Piece, WorldError> {
        let piece = self
            .piece(name)
            .ok_or_else(|| WorldError::PieceNotFound(name.to_owned()))?;
        if piece.is_alive() {
            Ok(piece)
        } else {
            Err(WorldError::PieceEliminated(name.to_owned()))
        }
    }

    fn put(&mut self, piece: &str, target: &str) -> Result<(), WorldError> {
        self.vacate(piece);
        let cell = self
            .cell_mut(target)
            .ok_or_else(|| WorldError::CellNotFound(target.to_owned()))?;
        cell.push(piece);
        let position = cell.stack_position(cell.len());
        let name = cell.name.clone();
        if let Some(p) = self.piece_mut(piece) {
            p.position = position;
            p.state = PieceState::Placed(name);
        }
        Ok(())
    }

    /// Remove a piece from whatever cell holds it and re-stack that cell.
    fn vacate(&mut self, piece: &str) {
        let Some(origin) = self.piece(piece).and_then(|p| p.cell()).map(str::to_owned) else {
            return;
        };
        let Some(cell) = self.cell_mut(&origin) else {
            return;
        };
        cell.remove(piece);
        let restack: Vec<(String, Vec3)> = cell
            .residents()
            .iter()
            .enumerate()
            .map(|(slot, r)| (r.clone(), cell.stack_position(slot)))
            .collect();
        for (name, position) in restack {
            if let Some(p) = self.piece_mut(&name) {
                p.position = position;
            }
        }
        if let Some(p) = self.piece_mut(piece) {
            p.state = PieceState::Unplaced;
        }
    }
}

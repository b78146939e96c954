/// Grid occupancy index — O(1) cell queries over the live play field.
///
/// The entity list owns all state; this index only maps occupied cells
/// to entity ids so movement and physics never scan the whole list.
/// At most one entity occupies a cell. Writers keep the index in sync
/// with entity logical positions: claim the destination cell when a
/// transition starts, not when the glide arrives.
///
/// A double insert into the same cell is a logic error upstream. Debug
/// builds assert; release builds let the new write win and hand the
/// displaced id back so the caller can retire it.

use std::collections::HashMap;

use crate::domain::entity::{Entity, EntityId};

/// Decorative frame piece for cells just outside the play field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BorderPiece {
    Corner,
    Horizontal,
    Vertical,
}

pub struct GridIndex {
    width: i32,
    height: i32,
    cells: HashMap<(i32, i32), EntityId>,
}

impl GridIndex {
    pub fn new(width: i32, height: i32) -> Self {
        GridIndex { width, height, cells: HashMap::new() }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    /// Id of the entity occupying (x, y), if any.
    #[inline]
    pub fn occupant_at(&self, x: i32, y: i32) -> Option<EntityId> {
        self.cells.get(&(x, y)).copied()
    }

    /// Claim (x, y) for `id`. Returns the displaced occupant on conflict.
    pub fn insert(&mut self, x: i32, y: i32, id: EntityId) -> Option<EntityId> {
        let displaced = self.cells.insert((x, y), id);
        debug_assert!(
            displaced.is_none(),
            "cell ({x}, {y}) double-claimed: {displaced:?} then {id}"
        );
        displaced
    }

    /// Free (x, y). Returns the id that held it.
    pub fn remove_at(&mut self, x: i32, y: i32) -> Option<EntityId> {
        self.cells.remove(&(x, y))
    }

    /// Move an occupant from one cell to another in a single step.
    /// Returns the displaced occupant of `to` on conflict.
    pub fn relocate(&mut self, from: (i32, i32), to: (i32, i32)) -> Option<EntityId> {
        let id = self.cells.remove(&from);
        debug_assert!(id.is_some(), "relocate from empty cell {from:?}");
        match id {
            Some(id) => self.insert(to.0, to.1, id),
            None => None,
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Can the player step into (x, y)?
    ///
    /// In bounds, and either empty or held by an occupant that yields to
    /// a step (intact terrain, resting pickup). Rocks and everything
    /// mid-animation block.
    pub fn is_walkable(&self, x: i32, y: i32, entities: &[Entity]) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        match self.occupant_at(x, y) {
            None => true,
            Some(id) => entities[id].is_walkable_occupant(),
        }
    }

    /// Frame decoration for the one-cell ring around the play field.
    /// None for cells inside the field or further out than the ring.
    pub fn border_piece(&self, x: i32, y: i32) -> Option<BorderPiece> {
        let on_x_edge = x == -1 || x == self.width;
        let on_y_edge = y == -1 || y == self.height;
        let x_inside = x >= -1 && x <= self.width;
        let y_inside = y >= -1 && y <= self.height;
        match (on_x_edge && y_inside, on_y_edge && x_inside) {
            (true, true) => Some(BorderPiece::Corner),
            (true, false) => Some(BorderPiece::Vertical),
            (false, true) => Some(BorderPiece::Horizontal),
            (false, false) => None,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Entity;

    fn small_index() -> GridIndex {
        GridIndex::new(5, 4)
    }

    // ── occupancy ──

    #[test]
    fn insert_then_query() {
        let mut g = small_index();
        assert_eq!(g.insert(2, 1, 7), None);
        assert_eq!(g.occupant_at(2, 1), Some(7));
        assert_eq!(g.occupant_at(2, 2), None);
    }

    #[test]
    fn remove_frees_the_cell() {
        let mut g = small_index();
        g.insert(2, 1, 7);
        assert_eq!(g.remove_at(2, 1), Some(7));
        assert_eq!(g.occupant_at(2, 1), None);
        assert_eq!(g.remove_at(2, 1), None);
    }

    #[test]
    fn relocate_moves_the_claim() {
        let mut g = small_index();
        g.insert(0, 0, 3);
        assert_eq!(g.relocate((0, 0), (1, 0)), None);
        assert_eq!(g.occupant_at(0, 0), None);
        assert_eq!(g.occupant_at(1, 0), Some(3));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn double_claim_displaces_in_release() {
        let mut g = small_index();
        g.insert(2, 1, 7);
        assert_eq!(g.insert(2, 1, 9), Some(7));
        assert_eq!(g.occupant_at(2, 1), Some(9));
    }

    #[test]
    #[should_panic(expected = "double-claimed")]
    #[cfg(debug_assertions)]
    fn double_claim_asserts_in_debug() {
        let mut g = small_index();
        g.insert(2, 1, 7);
        g.insert(2, 1, 9);
    }

    // ── bounds ──

    #[test]
    fn bounds_checks() {
        let g = small_index();
        assert!(g.in_bounds(0, 0));
        assert!(g.in_bounds(4, 3));
        assert!(!g.in_bounds(5, 0));
        assert!(!g.in_bounds(0, 4));
        assert!(!g.in_bounds(-1, 0));
    }

    // ── walkability ──

    #[test]
    fn empty_in_bounds_cell_is_walkable() {
        let g = small_index();
        let entities: Vec<Entity> = vec![];
        assert!(g.is_walkable(1, 1, &entities));
        assert!(!g.is_walkable(-1, 1, &entities));
        assert!(!g.is_walkable(1, 4, &entities));
    }

    #[test]
    fn walkability_follows_the_occupant() {
        let mut g = small_index();
        let entities = vec![
            Entity::terrain(0, 0),
            Entity::rock(1, 0),
            Entity::pickup(2, 0),
        ];
        for (id, e) in entities.iter().enumerate() {
            g.insert(e.x, e.y, id);
        }
        assert!(g.is_walkable(0, 0, &entities));
        assert!(!g.is_walkable(1, 0, &entities));
        assert!(g.is_walkable(2, 0, &entities));
    }

    // ── border decoration ──

    #[test]
    fn border_ring_pieces() {
        let g = small_index();
        assert_eq!(g.border_piece(-1, -1), Some(BorderPiece::Corner));
        assert_eq!(g.border_piece(5, -1), Some(BorderPiece::Corner));
        assert_eq!(g.border_piece(-1, 4), Some(BorderPiece::Corner));
        assert_eq!(g.border_piece(5, 4), Some(BorderPiece::Corner));
        assert_eq!(g.border_piece(2, -1), Some(BorderPiece::Horizontal));
        assert_eq!(g.border_piece(2, 4), Some(BorderPiece::Horizontal));
        assert_eq!(g.border_piece(-1, 2), Some(BorderPiece::Vertical));
        assert_eq!(g.border_piece(5, 2), Some(BorderPiece::Vertical));
    }

    #[test]
    fn border_is_only_the_ring() {
        let g = small_index();
        assert_eq!(g.border_piece(2, 2), None);
        assert_eq!(g.border_piece(-2, 2), None);
        assert_eq!(g.border_piece(6, -1), None);
        assert_eq!(g.border_piece(-2, -2), None);
    }
}

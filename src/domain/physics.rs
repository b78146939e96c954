/// Rock physics decision rules — single source of truth.
///
/// ## Architecture
///
/// Physics never touches entities or the grid index directly. The caller
/// hands it a *probe*: a function classifying any cell into one of three
/// categories. Decisions come back as plain values the caller applies.
/// This keeps every rule a pure function over cell classifications,
/// testable from a string diagram without building a level.
///
/// ## Cell classification
///
///   Empty    — in bounds, no occupant; a rock may fall or roll into it
///   RollHost — occupied by a rounded thing rocks slide off
///              (another rock, or a pickup sitting at rest)
///   Blocked  — anything else: terrain, walls, the player, out of bounds
///
/// ## Decision rules
///
/// A resting rock, when its gravity timer fires:
///   1. Cell below Empty           → FALL (claim the cell, glide down)
///   2. Cell below RollHost        → try a roll-off, right side first:
///        side cell Empty AND diagonal-below cell Empty → ROLL that way
///   3. Otherwise                  → REST
///
/// Rocks sitting on Blocked cells (terrain, walls) never roll; only a
/// rounded support sheds them. The right-then-left probe order makes
/// tie-breaks deterministic.

use super::entity::RollDir;

// ══════════════════════════════════════════════════════════════
// Cell probe
// ══════════════════════════════════════════════════════════════

/// What the physics pass can see of a single cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Probe {
    /// In bounds and unoccupied.
    Empty,
    /// Occupied by a rock or a resting pickup — rounded, sheds rocks.
    RollHost,
    /// Occupied by anything else, or out of bounds.
    Blocked,
}

/// Outcome of one gravity evaluation for a resting rock.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FallDecision {
    /// Cell below is free: start falling into it.
    Fall,
    /// Supported by a rounded host with a clear side: start rolling.
    Roll(RollDir),
    /// Stay put.
    Rest,
}

// ══════════════════════════════════════════════════════════════
// Decision rules
// ══════════════════════════════════════════════════════════════

/// Can a rock at (x, y) roll toward `side_x`?
///
/// Both the side cell and the cell diagonally below it must be Empty,
/// so the rock has somewhere to go after it slides across.
#[inline]
fn can_roll_to(probe: &impl Fn(i32, i32) -> Probe, side_x: i32, y: i32) -> bool {
    probe(side_x, y) == Probe::Empty && probe(side_x, y + 1) == Probe::Empty
}

/// Pick a roll direction for a rock at (x, y), right side first.
///
/// This is the roll-off rule on its own: callers use it both when a
/// fall is obstructed by a rounded host and for the periodic check on
/// rocks that have been resting on one all along.
pub fn roll_choice(probe: &impl Fn(i32, i32) -> Probe, x: i32, y: i32) -> Option<RollDir> {
    for dir in [RollDir::Right, RollDir::Left] {
        if can_roll_to(probe, x + dir.dx(), y) {
            return Some(dir);
        }
    }
    None
}

/// Full gravity evaluation for a resting rock at (x, y).
///
/// Falling wins over rolling; rolling happens only off a rounded host.
pub fn resolve_rock(probe: &impl Fn(i32, i32) -> Probe, x: i32, y: i32) -> FallDecision {
    match probe(x, y + 1) {
        Probe::Empty => FallDecision::Fall,
        Probe::RollHost => match roll_choice(probe, x, y) {
            Some(dir) => FallDecision::Roll(dir),
            None => FallDecision::Rest,
        },
        Probe::Blocked => FallDecision::Rest,
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a probe from a string diagram.
    ///
    ///   '.' Empty    'o' RollHost (rock)    '*' RollHost (pickup)
    ///   '#' Blocked (terrain/wall)          anything outside → Blocked
    fn probe_from<'a>(rows: &'a [&'a str]) -> impl Fn(i32, i32) -> Probe + 'a {
        move |x: i32, y: i32| {
            if y < 0 || y as usize >= rows.len() {
                return Probe::Blocked;
            }
            let row = rows[y as usize].as_bytes();
            if x < 0 || x as usize >= row.len() {
                return Probe::Blocked;
            }
            match row[x as usize] {
                b'.' => Probe::Empty,
                b'o' | b'*' => Probe::RollHost,
                _ => Probe::Blocked,
            }
        }
    }

    // ── resolve_rock: falling ──

    #[test]
    fn falls_into_empty_cell_below() {
        let p = probe_from(&[
            ".o.",
            "...",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Fall);
    }

    #[test]
    fn rests_on_terrain() {
        let p = probe_from(&[
            ".o.",
            ".#.",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Rest);
    }

    #[test]
    fn rests_on_map_floor() {
        let p = probe_from(&[
            ".o.",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Rest);
    }

    #[test]
    fn fall_wins_over_roll() {
        // Below is empty even though a rock sits diagonally under.
        let p = probe_from(&[
            ".o.",
            "...",
            "oo.",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Fall);
    }

    // ── resolve_rock: rolling ──

    #[test]
    fn rolls_right_off_a_rock() {
        let p = probe_from(&[
            ".o.",
            ".o.",
            "...",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Roll(RollDir::Right));
    }

    #[test]
    fn right_side_wins_when_both_are_clear() {
        let p = probe_from(&[
            "...o...",
            "...o...",
            ".......",
        ]);
        assert_eq!(resolve_rock(&p, 3, 0), FallDecision::Roll(RollDir::Right));
    }

    #[test]
    fn rolls_left_when_right_is_blocked() {
        let p = probe_from(&[
            ".o#",
            ".o#",
            "...",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Roll(RollDir::Left));
    }

    #[test]
    fn blocked_diagonal_forbids_the_roll() {
        // Side cells are clear but both landing cells are filled.
        let p = probe_from(&[
            ".o.",
            "ooo",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Rest);
    }

    #[test]
    fn rolls_off_a_resting_pickup() {
        let p = probe_from(&[
            ".o.",
            ".*.",
            "...",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Roll(RollDir::Right));
    }

    #[test]
    fn never_rolls_off_terrain() {
        // Clear on both sides, but the support is flat ground.
        let p = probe_from(&[
            ".o.",
            ".#.",
            "...",
        ]);
        assert_eq!(resolve_rock(&p, 1, 0), FallDecision::Rest);
    }

    #[test]
    fn map_edge_blocks_the_roll() {
        // Rock in the corner on top of another: left is off-map,
        // right diagonal is filled.
        let p = probe_from(&[
            "o.",
            "oo",
        ]);
        assert_eq!(resolve_rock(&p, 0, 0), FallDecision::Rest);
    }

    // ── roll_choice on its own ──

    #[test]
    fn roll_choice_requires_both_cells() {
        // Right side cell free but right diagonal filled; left fully free.
        let p = probe_from(&[
            ".o.",
            ".o#",
            "..#",
        ]);
        assert_eq!(roll_choice(&p, 1, 0), Some(RollDir::Left));
    }

    #[test]
    fn roll_choice_none_when_penned_in() {
        let p = probe_from(&[
            "#o#",
            "#o#",
        ]);
        assert_eq!(roll_choice(&p, 1, 0), None);
    }
}

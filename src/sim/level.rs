/// Level runtime: the complete snapshot of a level in play.
///
/// ## Ownership
///
/// One entity vec owns every placeable thing; `GridIndex` maps occupied
/// cells back to vec indices for O(1) queries. Ids are plain indices,
/// stable between sweeps: `sweep_inactive` compacts removed entities
/// away and remaps every stored id (player handle, pending effects).
///
/// ## Population
///
/// Catalog records carry a 60x24 raw grid whose outer ring is a
/// cosmetic frame. Population strips the ring and shifts everything
/// up-left by one, so live play starts at (0, 0); the renderer draws
/// its own frame from `GridIndex::border_piece`. A record with no
/// player-start byte gets the traditional fallback spawn, surfaced as
/// a notice rather than an error.
///
/// ## Camera / Viewport
///
/// World coordinates and screen coordinates are separate:
///   - `camera` — viewport into the world (top-left corner + size)
///   - Renderer maps: `screen(sx, sy) = world(camera.x + sx, camera.y + sy)`
///   - Camera follows the player with a dead-zone approach
///   - Maps smaller than the viewport are centered

use crate::config::{GridConfig, SpeedConfig};
use crate::domain::entity::{Entity, EntityId, EntityKind};
use crate::domain::physics::Probe;
use crate::sim::catalog::{LevelRecord, RAW_HEIGHT, RAW_WIDTH};
use crate::sim::grid::GridIndex;

/// Spawn cell used when a record carries no player-start tile.
const FALLBACK_SPAWN: (i32, i32) = (5, 10);

/// Side effect that fires when the in-flight player step arrives.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PendingEffect {
    /// Terrain the player stepped into: retire it on arrival.
    ClearTerrain { entity: EntityId },
    /// The step ends inside the open exit: level complete on arrival.
    EnterExit,
}

/// Camera: a viewport into the world.
///
/// `(x, y)` is the world coordinate of the top-left visible cell.
/// `(view_w, view_h)` is how many world cells fit in the viewport.
/// These are computed from terminal size and set during `render()`.
#[derive(Clone, Debug)]
pub struct Camera {
    /// World X of the top-left visible cell (can be negative for centering)
    pub x: i32,
    /// World Y of the top-left visible cell
    pub y: i32,
    /// Number of world columns visible
    pub view_w: i32,
    /// Number of world rows visible
    pub view_h: i32,
}

impl Camera {
    pub fn new() -> Self {
        Camera { x: 0, y: 0, view_w: 0, view_h: 0 }
    }

    /// Update camera to follow a target position within the given world
    /// bounds. Dead-zone approach: only scroll when the target nears the
    /// edge of the viewport, so small digs don't jerk the screen.
    pub fn follow(&mut self, target_x: i32, target_y: i32, world_w: i32, world_h: i32) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }

        // If map fits entirely in viewport, center it
        if world_w <= self.view_w {
            self.x = -((self.view_w - world_w) / 2);
        } else {
            // Dead zone: inner 60% of viewport; 20% margin on each side.
            let margin_x = self.view_w / 5;
            let left_bound = self.x + margin_x;
            let right_bound = self.x + self.view_w - margin_x - 1;

            if target_x < left_bound {
                self.x = target_x - margin_x;
            } else if target_x > right_bound {
                self.x = target_x - self.view_w + margin_x + 1;
            }

            self.x = self.x.max(0).min((world_w - self.view_w).max(0));
        }

        if world_h <= self.view_h {
            self.y = -((self.view_h - world_h) / 2);
        } else {
            let margin_y = self.view_h / 5;
            let top_bound = self.y + margin_y;
            let bottom_bound = self.y + self.view_h - margin_y - 1;

            if target_y < top_bound {
                self.y = target_y - margin_y;
            } else if target_y > bottom_bound {
                self.y = target_y - self.view_h + margin_y + 1;
            }

            self.y = self.y.max(0).min((world_h - self.view_h).max(0));
        }
    }

    /// Snap camera directly to center on a position (no dead zone).
    /// Used for the first frame after a level load or restart.
    pub fn center_on(&mut self, target_x: i32, target_y: i32, world_w: i32, world_h: i32) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }

        if world_w <= self.view_w {
            self.x = -((self.view_w - world_w) / 2);
        } else {
            self.x = (target_x - self.view_w / 2).max(0).min((world_w - self.view_w).max(0));
        }

        if world_h <= self.view_h {
            self.y = -((self.view_h - world_h) / 2);
        } else {
            self.y = (target_y - self.view_h / 2).max(0).min((world_h - self.view_h).max(0));
        }
    }
}

pub struct Level {
    // ── Entities + occupancy ──
    pub entities: Vec<Entity>,
    pub grid: GridIndex,
    /// Handle of the player entity; remapped by the sweep.
    pub player: Option<EntityId>,
    /// Effects waiting on the in-flight player step.
    pub pending: Vec<PendingEffect>,

    // ── Progress ──
    pub collected: u32,
    pub required: u32,
    /// Latched once `collected` reaches `required`; never re-closes.
    pub exit_open: bool,

    // ── Record metadata ──
    pub title: String,
    /// Gravity flag from the record; carried for display, the player
    /// is not pulled down by it.
    pub gravity: bool,
    /// Record flag: rocks hold still, only the player acts.
    pub freeze_rocks: bool,
    pub current_level: usize,
    pub total_levels: usize,

    // ── Speed config ──
    pub speed: SpeedConfig,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
    /// Non-fatal decode complaints, surfaced on the message line.
    pub notices: Vec<String>,

    // ── Camera / time ──
    pub camera: Camera,
    pub tick: u64,
}

// ── Construction / population ──

impl Level {
    pub fn new(speed: SpeedConfig, grid: &GridConfig) -> Self {
        Level {
            entities: vec![],
            grid: GridIndex::new(grid.width, grid.height),
            player: None,
            pending: vec![],
            collected: 0,
            required: 0,
            exit_open: true,
            title: String::new(),
            gravity: false,
            freeze_rocks: false,
            current_level: 0,
            total_levels: 0,
            speed,
            message: String::new(),
            message_timer: 0,
            notices: vec![],
            camera: Camera::new(),
            tick: 0,
        }
    }

    /// Build the live level from a decoded catalog record.
    pub fn from_record(
        record: &LevelRecord,
        index: usize,
        total: usize,
        speed: SpeedConfig,
        grid: &GridConfig,
    ) -> Self {
        let mut level = Level::new(speed, grid);
        level.title = record.title.clone();
        level.current_level = index;
        level.total_levels = total;
        level.gravity = record.gravity;
        level.freeze_rocks = record.freeze_rocks;
        level.required = record.required_pickups as u32;
        level.exit_open = level.required == 0;

        let mut spawn: Option<(i32, i32)> = None;
        let mut unknown_seen: Vec<u8> = vec![];

        // Skip the raw frame ring and shift everything up-left by one.
        for row in 1..RAW_HEIGHT {
            for col in 1..RAW_WIDTH {
                let (x, y) = (col as i32 - 1, row as i32 - 1);
                if !level.grid.in_bounds(x, y) {
                    continue;
                }
                let code = record.tile_at(col, row);
                match code {
                    0x00 => {}
                    0x03 => {
                        if spawn.is_none() {
                            spawn = Some((x, y));
                        }
                    }
                    code => match Entity::from_tile_code(code, x, y) {
                        Some(e) => {
                            level.spawn_entity(e);
                        }
                        None => {
                            if !unknown_seen.contains(&code) {
                                unknown_seen.push(code);
                                level.notices.push(format!(
                                    "unknown tile code 0x{code:02x} at ({x}, {y}), using terrain"
                                ));
                            }
                            level.spawn_entity(Entity::terrain(x, y));
                        }
                    },
                }
            }
        }

        let (px, py) = match spawn {
            Some(p) => p,
            None => {
                let p = (
                    FALLBACK_SPAWN.0.min(grid.width - 1).max(0),
                    FALLBACK_SPAWN.1.min(grid.height - 1).max(0),
                );
                level
                    .notices
                    .push(format!("no player start in level data, spawning at ({}, {})", p.0, p.1));
                p
            }
        };
        // The fallback cell may hold something; the player wins it.
        if let Some(id) = level.grid.remove_at(px, py) {
            level.entities[id].active = false;
        }
        let pid = level.spawn_entity(Entity::player(px, py));
        level.player = Some(pid);
        level.sweep_inactive();
        level
    }

    /// Built-in demo level used when no catalog file is around: a
    /// walled chamber with a diggable bed, buried pickups and a few
    /// rock stacks to knock over.
    pub fn test_level(speed: SpeedConfig, grid: &GridConfig) -> Self {
        let mut level = Level::new(speed, grid);
        level.title = String::from("TEST CHAMBER");
        level.total_levels = 1;
        let w = level.grid.width();
        let h = level.grid.height();

        for x in 0..w {
            level.spawn_entity(Entity::new(EntityKind::Wall, x, 0));
            level.spawn_entity(Entity::new(EntityKind::Wall, x, h - 1));
        }
        for y in 1..h - 1 {
            level.spawn_entity(Entity::new(EntityKind::Wall, 0, y));
            level.spawn_entity(Entity::new(EntityKind::Wall, w - 1, y));
        }

        // Diggable bed with pickups buried in it.
        let bed_top = h - 6;
        for x in 1..w - 1 {
            for y in bed_top..h - 1 {
                if (x * 3 + y * 5) % 11 == 0 {
                    level.spawn_entity(Entity::pickup(x, y));
                } else {
                    level.spawn_entity(Entity::terrain(x, y));
                }
            }
        }

        // Rock stacks resting on the bed, every other one doubled.
        let mut x = 4;
        while x < w - 4 {
            level.spawn_entity(Entity::rock(x, bed_top - 1));
            if x % 12 == 4 {
                level.spawn_entity(Entity::rock(x, bed_top - 2));
            }
            x += 6;
        }

        level.spawn_entity(Entity::new(EntityKind::Exit, w - 2, bed_top - 1));

        level.required = level
            .entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Pickup(_)))
            .count() as u32;
        level.exit_open = level.required == 0;

        let (px, py) = (2, bed_top - 1);
        let pid = level.spawn_entity(Entity::player(px, py));
        level.player = Some(pid);
        level
    }

    /// Push a new entity and claim its cell. Returns its handle.
    pub fn spawn_entity(&mut self, e: Entity) -> EntityId {
        let id = self.entities.len();
        if e.occupies_cell() {
            self.grid.insert(e.x, e.y, id);
        }
        self.entities.push(e);
        id
    }
}

// ── Queries ──

impl Level {
    pub fn player_entity(&self) -> Option<&Entity> {
        self.player.map(|id| &self.entities[id])
    }

    pub fn player_entity_mut(&mut self) -> Option<&mut Entity> {
        let id = self.player?;
        Some(&mut self.entities[id])
    }

    /// Cell classification for the rock physics pass.
    #[inline]
    pub fn probe_at(&self, x: i32, y: i32) -> Probe {
        if !self.grid.in_bounds(x, y) {
            return Probe::Blocked;
        }
        match self.grid.occupant_at(x, y) {
            None => Probe::Empty,
            Some(id) if self.entities[id].is_roll_host() => Probe::RollHost,
            Some(_) => Probe::Blocked,
        }
    }

    /// Can the player step into (x, y)?
    #[inline]
    pub fn walkable(&self, x: i32, y: i32) -> bool {
        self.grid.is_walkable(x, y, &self.entities)
    }

    /// Active entities whose logical cell lies in the inclusive rect.
    /// The renderer pads the viewport by one cell so gliding entities
    /// whose render position trails the logical cell stay visible.
    pub fn entities_in_region(
        &self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
    ) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |e| e.active && e.x >= x0 && e.x <= x1 && e.y >= y0 && e.y <= y1)
    }
}

// ── Maintenance ──

impl Level {
    /// Compact inactive entities away and remap every stored id.
    /// Keeps insertion order, so the physics pass stays deterministic.
    pub fn sweep_inactive(&mut self) {
        if self.entities.iter().all(|e| e.active) {
            return;
        }

        let mut remap: Vec<Option<EntityId>> = Vec::with_capacity(self.entities.len());
        let mut kept: Vec<Entity> = Vec::with_capacity(self.entities.len());
        for e in self.entities.drain(..) {
            if e.active {
                remap.push(Some(kept.len()));
                kept.push(e);
            } else {
                remap.push(None);
            }
        }
        self.entities = kept;

        self.grid.clear();
        for (id, e) in self.entities.iter().enumerate() {
            if e.occupies_cell() {
                self.grid.insert(e.x, e.y, id);
            }
        }

        self.player = self.player.and_then(|p| remap[p]);
        self.pending.retain_mut(|eff| match eff {
            PendingEffect::ClearTerrain { entity } => match remap[*entity] {
                Some(id) => {
                    *entity = id;
                    true
                }
                None => false,
            },
            PendingEffect::EnterExit => true,
        });
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::catalog::Catalog;

    fn test_speed() -> SpeedConfig {
        SpeedConfig {
            tick_rate_ms: 16,
            fall_speed: 4.0,
            roll_speed: 3.0,
            move_speed: 8.0,
            gravity_interval: 0.05,
        }
    }

    fn small_grid() -> GridConfig {
        GridConfig { width: 58, height: 22 }
    }

    /// One raw record with tiles placed at raw coordinates.
    fn record_with(tiles: &[(usize, usize, u8)], required: u8) -> LevelRecord {
        let mut bytes = vec![0u8; crate::sim::catalog::RECORD_SIZE];
        for &(col, row, code) in tiles {
            bytes[row * RAW_WIDTH + col] = code;
        }
        bytes[1470] = required;
        let cat = Catalog::from_bytes(&bytes);
        cat.record(0).unwrap().clone()
    }

    // ── population ──

    #[test]
    fn population_shifts_off_the_frame_ring() {
        // Raw (3, 2) lands at live (2, 1).
        let rec = record_with(&[(3, 2, 0x01), (10, 5, 0x03)], 0);
        let level = Level::from_record(&rec, 0, 1, test_speed(), &small_grid());

        let id = level.grid.occupant_at(2, 1).unwrap();
        assert!(matches!(level.entities[id].kind, EntityKind::Rock(_)));

        let p = level.player_entity().unwrap();
        assert_eq!((p.x, p.y), (9, 4));
    }

    #[test]
    fn frame_ring_cells_are_dropped() {
        // Tiles on the raw ring never reach the live grid.
        let rec = record_with(&[(0, 5, 0x06), (59, 5, 0x06), (5, 0, 0x06), (10, 5, 0x03)], 0);
        let level = Level::from_record(&rec, 0, 1, test_speed(), &small_grid());
        let walls = level
            .entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Wall))
            .count();
        assert_eq!(walls, 0);
    }

    #[test]
    fn missing_player_start_falls_back_with_notice() {
        let rec = record_with(&[(1, 1, 0x02)], 0);
        let level = Level::from_record(&rec, 0, 1, test_speed(), &small_grid());
        let p = level.player_entity().unwrap();
        assert_eq!((p.x, p.y), FALLBACK_SPAWN);
        assert!(level.notices.iter().any(|n| n.contains("no player start")));
    }

    #[test]
    fn unknown_code_becomes_terrain_with_one_notice() {
        let rec = record_with(&[(2, 2, 0x7f), (3, 2, 0x7f), (10, 5, 0x03)], 0);
        let level = Level::from_record(&rec, 0, 1, test_speed(), &small_grid());

        let id = level.grid.occupant_at(1, 1).unwrap();
        assert!(matches!(level.entities[id].kind, EntityKind::Terrain(_)));
        let notices = level.notices.iter().filter(|n| n.contains("0x7f")).count();
        assert_eq!(notices, 1);
    }

    #[test]
    fn required_zero_opens_the_exit_at_load() {
        let rec = record_with(&[(10, 5, 0x03)], 0);
        let level = Level::from_record(&rec, 0, 1, test_speed(), &small_grid());
        assert!(level.exit_open);

        let rec = record_with(&[(10, 5, 0x03), (4, 4, 0x04)], 1);
        let level = Level::from_record(&rec, 0, 1, test_speed(), &small_grid());
        assert!(!level.exit_open);
        assert_eq!(level.required, 1);
    }

    #[test]
    fn test_level_is_playable() {
        let level = Level::test_level(test_speed(), &small_grid());
        assert!(level.player.is_some());
        assert!(level.required > 0);
        assert!(!level.exit_open);
        assert!(level
            .entities
            .iter()
            .any(|e| matches!(e.kind, EntityKind::Exit)));
        // Every occupant agrees with the index.
        for (id, e) in level.entities.iter().enumerate() {
            if e.occupies_cell() {
                assert_eq!(level.grid.occupant_at(e.x, e.y), Some(id));
            }
        }
    }

    // ── sweep ──

    #[test]
    fn sweep_compacts_and_remaps() {
        let mut level = Level::new(test_speed(), &small_grid());
        let a = level.spawn_entity(Entity::rock(1, 1));
        let b = level.spawn_entity(Entity::terrain(2, 1));
        let p = level.spawn_entity(Entity::player(3, 1));
        level.player = Some(p);
        level.pending.push(PendingEffect::ClearTerrain { entity: b });

        // Retire the rock; the terrain and player slide down one slot.
        level.grid.remove_at(1, 1);
        level.entities[a].active = false;
        level.sweep_inactive();

        assert_eq!(level.entities.len(), 2);
        assert_eq!(level.player, Some(1));
        assert_eq!(level.grid.occupant_at(3, 1), Some(1));
        assert_eq!(level.pending, vec![PendingEffect::ClearTerrain { entity: 0 }]);
        assert_eq!(level.grid.occupant_at(2, 1), Some(0));
    }

    #[test]
    fn sweep_drops_effects_of_dead_entities() {
        let mut level = Level::new(test_speed(), &small_grid());
        let t = level.spawn_entity(Entity::terrain(2, 1));
        level.pending.push(PendingEffect::ClearTerrain { entity: t });
        level.pending.push(PendingEffect::EnterExit);

        level.grid.remove_at(2, 1);
        level.entities[t].active = false;
        level.sweep_inactive();

        assert_eq!(level.pending, vec![PendingEffect::EnterExit]);
    }

    #[test]
    fn sweep_without_corpses_is_a_noop() {
        let mut level = Level::new(test_speed(), &small_grid());
        level.spawn_entity(Entity::rock(1, 1));
        let before = level.entities.len();
        level.sweep_inactive();
        assert_eq!(level.entities.len(), before);
    }

    // ── queries ──

    #[test]
    fn probe_classifies_cells() {
        let mut level = Level::new(test_speed(), &small_grid());
        level.spawn_entity(Entity::rock(1, 1));
        level.spawn_entity(Entity::pickup(2, 1));
        level.spawn_entity(Entity::terrain(3, 1));

        assert_eq!(level.probe_at(0, 0), Probe::Empty);
        assert_eq!(level.probe_at(1, 1), Probe::RollHost);
        assert_eq!(level.probe_at(2, 1), Probe::RollHost);
        assert_eq!(level.probe_at(3, 1), Probe::Blocked);
        assert_eq!(level.probe_at(-1, 0), Probe::Blocked);
    }

    #[test]
    fn region_query_is_inclusive_and_skips_inactive() {
        let mut level = Level::new(test_speed(), &small_grid());
        level.spawn_entity(Entity::rock(1, 1));
        level.spawn_entity(Entity::rock(3, 3));
        let dead = level.spawn_entity(Entity::rock(2, 2));
        level.grid.remove_at(2, 2);
        level.entities[dead].active = false;

        let hits: Vec<(i32, i32)> = level
            .entities_in_region(1, 1, 3, 3)
            .map(|e| (e.x, e.y))
            .collect();
        assert_eq!(hits, vec![(1, 1), (3, 3)]);
    }

    // ── camera ──

    #[test]
    fn camera_centers_small_worlds() {
        let mut cam = Camera::new();
        cam.view_w = 40;
        cam.view_h = 30;
        cam.follow(5, 5, 20, 10);
        assert_eq!(cam.x, -10);
        assert_eq!(cam.y, -10);
    }

    #[test]
    fn camera_dead_zone_scrolls_only_near_edges() {
        let mut cam = Camera::new();
        cam.view_w = 20;
        cam.view_h = 10;
        // Center of a big world: no scrolling while inside the zone.
        cam.center_on(30, 11, 58, 22);
        let (cx, cy) = (cam.x, cam.y);
        cam.follow(30, 11, 58, 22);
        assert_eq!((cam.x, cam.y), (cx, cy));
        // Past the margin the camera tracks.
        cam.follow(cx + 19, 11, 58, 22);
        assert!(cam.x > cx);
    }
}

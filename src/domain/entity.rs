/// Entities: every placeable thing on the grid is one `Entity` with a
/// kind payload — rocks, terrain, pickups, the player, and the inert
/// decoded variants. One struct owns what all variants share (logical
/// cell, continuous render position, liveness); the payload owns the
/// per-kind state machine.
///
/// Logical vs render position: the logical `(x, y)` cell is the
/// authoritative one, registered in the grid index. When a transition
/// starts (fall, roll, player step) the logical cell moves immediately
/// and `(rx, ry)` glides after it at the variant's speed; the
/// transition completes when the glide arrives.

use super::anim::{self, AnimPolicy, Animation, frame};

/// Stable handle into the level's entity vec. Remapped by the
/// inactive-entity sweep; never dangles between sweeps.
pub type EntityId = usize;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

/// Movement direction (continuous while key held)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveDir {
    Left,
    Right,
    Up,
    Down,
}

impl MoveDir {
    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            MoveDir::Left => (-1, 0),
            MoveDir::Right => (1, 0),
            MoveDir::Up => (0, -1),
            MoveDir::Down => (0, 1),
        }
    }

    /// Horizontal directions steer the facing; vertical ones keep it.
    #[inline]
    pub fn facing(self) -> Option<Facing> {
        match self {
            MoveDir::Left => Some(Facing::Left),
            MoveDir::Right => Some(Facing::Right),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RollDir {
    Left,
    Right,
}

impl RollDir {
    #[inline]
    pub fn dx(self) -> i32 {
        match self {
            RollDir::Left => -1,
            RollDir::Right => 1,
        }
    }
}

/// Per-tick command sampled from the input layer: a held direction plus
/// the dig modifier bit. Level-triggered — holding the keys repeats the
/// action as soon as the current one completes.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameInput {
    pub movement: Option<MoveDir>,
    pub dig: bool,
}

// ── Kind payloads ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RockState {
    Resting,
    Falling,
    Rolling(RollDir),
}

#[derive(Clone, Debug)]
pub struct RockBody {
    pub state: RockState,
    /// Throttle for the gravity decision; accumulates dt and fires at
    /// the configured interval (doubled while falling/rolling).
    pub gravity_timer: f32,
    /// Roll pose cycle, present only while rolling.
    pub roll_anim: Option<Animation>,
}

impl RockBody {
    fn new() -> Self {
        RockBody {
            state: RockState::Resting,
            gravity_timer: 0.0,
            roll_anim: None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum TerrainState {
    Intact,
    /// Dug: crumble animation runs, cell stays blocked until it ends.
    Clearing(Animation),
    /// The player stepped in: the cell already belongs to the player
    /// and this entity only lingers visually until the step completes.
    Underfoot,
}

#[derive(Clone, Debug)]
pub struct TerrainBody {
    pub state: TerrainState,
}

impl TerrainBody {
    /// Begin the crumble animation. Digging terrain that is already
    /// clearing (or underfoot) changes nothing; returns whether a new
    /// clear actually started.
    pub fn start_clearing(&mut self) -> bool {
        if !matches!(self.state, TerrainState::Intact) {
            return false;
        }
        self.state = TerrainState::Clearing(Animation::new(
            anim::CLEAR_SEQ,
            anim::CLEAR_FRAME_TIME,
            AnimPolicy::Once,
        ));
        true
    }
}

#[derive(Clone, Debug)]
pub enum PickupState {
    Resting,
    Collecting(Animation),
}

#[derive(Clone, Debug)]
pub struct PickupBody {
    pub state: PickupState,
}

impl PickupBody {
    /// Begin the collect animation. Repeated digs are no-ops; returns
    /// whether a new collection actually started.
    pub fn start_collecting(&mut self) -> bool {
        if !matches!(self.state, PickupState::Resting) {
            return false;
        }
        self.state = PickupState::Collecting(Animation::new(
            anim::COLLECT_SEQ,
            anim::COLLECT_FRAME_TIME,
            AnimPolicy::Once,
        ));
        true
    }
}

#[derive(Clone, Debug)]
pub enum PlayerAction {
    Idle,
    Moving,
    Digging(Animation),
}

#[derive(Clone, Debug)]
pub struct PlayerBody {
    pub action: PlayerAction,
    pub facing: Facing,
    /// Walk cycle for the current facing; persists across chained steps
    /// so held-key movement doesn't restart the stride every cell.
    pub walk: Animation,
    /// True between chained steps while movement is still held: the
    /// sprite stays mid-cycle instead of snapping to the idle pose.
    pub cycle_hold: bool,
}

impl PlayerBody {
    fn new() -> Self {
        PlayerBody {
            action: PlayerAction::Idle,
            facing: Facing::Right,
            walk: walk_cycle(Facing::Right),
            cycle_hold: false,
        }
    }
}

pub fn walk_cycle(facing: Facing) -> Animation {
    let seq = match facing {
        Facing::Left => anim::WALK_LEFT_CYCLE,
        Facing::Right => anim::WALK_RIGHT_CYCLE,
    };
    Animation::new(seq, anim::WALK_FRAME_TIME, AnimPolicy::Loop)
}

pub fn dig_pose(dir: MoveDir) -> Animation {
    let seq = match dir {
        MoveDir::Left => anim::DIG_LEFT_POSE,
        MoveDir::Right => anim::DIG_RIGHT_POSE,
        MoveDir::Up => anim::DIG_UP_POSE,
        MoveDir::Down => anim::DIG_DOWN_POSE,
    };
    Animation::new(seq, anim::DIG_POSE_TIME, AnimPolicy::Once)
}

pub fn roll_anim(dir: RollDir) -> Animation {
    let seq = match dir {
        RollDir::Left => anim::ROLL_LEFT_SEQ,
        RollDir::Right => anim::ROLL_RIGHT_SEQ,
    };
    Animation::new(seq, anim::ROLL_FRAME_TIME, AnimPolicy::Loop)
}

#[derive(Clone, Debug)]
pub enum EntityKind {
    Rock(RockBody),
    Terrain(TerrainBody),
    Pickup(PickupBody),
    Player(PlayerBody),
    Chip,
    Wall,
    Exit,
    OrangeDisk,
    Terminal,
    SnikSnak,
    Electron,
}

// ── Entity ──

#[derive(Clone, Debug)]
pub struct Entity {
    /// Authoritative grid cell (registered in the grid index).
    pub x: i32,
    pub y: i32,
    /// Continuous render position in tile units; glides toward (x, y).
    pub rx: f32,
    pub ry: f32,
    /// Cleared on removal; the sweep compacts inactive entities away.
    pub active: bool,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(kind: EntityKind, x: i32, y: i32) -> Self {
        Entity {
            x,
            y,
            rx: x as f32,
            ry: y as f32,
            active: true,
            kind,
        }
    }

    pub fn rock(x: i32, y: i32) -> Self {
        Entity::new(EntityKind::Rock(RockBody::new()), x, y)
    }

    pub fn terrain(x: i32, y: i32) -> Self {
        Entity::new(
            EntityKind::Terrain(TerrainBody {
                state: TerrainState::Intact,
            }),
            x,
            y,
        )
    }

    pub fn pickup(x: i32, y: i32) -> Self {
        Entity::new(
            EntityKind::Pickup(PickupBody {
                state: PickupState::Resting,
            }),
            x,
            y,
        )
    }

    pub fn player(x: i32, y: i32) -> Self {
        Entity::new(EntityKind::Player(PlayerBody::new()), x, y)
    }

    /// Entity for a catalog tile code, or None for codes that place
    /// nothing here (empty, player-start) and for unrecognized codes —
    /// the decoder layer substitutes its own default for those.
    pub fn from_tile_code(code: u8, x: i32, y: i32) -> Option<Self> {
        let kind = match code {
            0x01 => EntityKind::Rock(RockBody::new()),
            0x02 => EntityKind::Terrain(TerrainBody {
                state: TerrainState::Intact,
            }),
            0x04 => EntityKind::Pickup(PickupBody {
                state: PickupState::Resting,
            }),
            0x05 => EntityKind::Chip,
            0x06 => EntityKind::Wall,
            0x07 => EntityKind::Exit,
            0x08 => EntityKind::OrangeDisk,
            0x11 => EntityKind::SnikSnak,
            0x13 => EntityKind::Terminal,
            0x18 | 0x19 => EntityKind::Electron,
            _ => return None,
        };
        Some(Entity::new(kind, x, y))
    }

    // ── Occupancy predicates ──

    /// Does this entity hold its grid cell? False only for terrain the
    /// player is currently stepping into (the cell is the player's).
    pub fn occupies_cell(&self) -> bool {
        !matches!(
            self.kind,
            EntityKind::Terrain(TerrainBody {
                state: TerrainState::Underfoot,
            })
        )
    }

    /// May the player step onto this occupant? Only intact terrain and
    /// resting pickups — everything else (rocks, mid-animation
    /// entities, walls, the player itself) blocks.
    pub fn is_walkable_occupant(&self) -> bool {
        match &self.kind {
            EntityKind::Terrain(t) => matches!(t.state, TerrainState::Intact),
            EntityKind::Pickup(p) => matches!(p.state, PickupState::Resting),
            _ => false,
        }
    }

    /// Does a rock roll off this occupant? Rounded tops only: rocks
    /// (whatever they're doing) and pickups still at rest.
    pub fn is_roll_host(&self) -> bool {
        match &self.kind {
            EntityKind::Rock(_) => true,
            EntityKind::Pickup(p) => matches!(p.state, PickupState::Resting),
            _ => false,
        }
    }

    // ── Render read model ──

    #[inline]
    pub fn render_pos(&self) -> (f32, f32) {
        (self.rx, self.ry)
    }

    /// Current frame id for the render theme.
    pub fn frame(&self) -> u16 {
        match &self.kind {
            EntityKind::Rock(r) => match (&r.state, &r.roll_anim) {
                (RockState::Rolling(_), Some(a)) => a.frame(),
                _ => frame::ROCK,
            },
            EntityKind::Terrain(t) => match &t.state {
                TerrainState::Intact | TerrainState::Underfoot => frame::TERRAIN,
                TerrainState::Clearing(a) => a.frame(),
            },
            EntityKind::Pickup(p) => match &p.state {
                PickupState::Resting => frame::PICKUP,
                PickupState::Collecting(a) => a.frame(),
            },
            EntityKind::Player(p) => match &p.action {
                PlayerAction::Moving => p.walk.frame(),
                PlayerAction::Digging(pose) => pose.frame(),
                PlayerAction::Idle if p.cycle_hold => p.walk.frame(),
                PlayerAction::Idle => match p.facing {
                    Facing::Left => frame::IDLE_LEFT,
                    Facing::Right => frame::IDLE_RIGHT,
                },
            },
            EntityKind::Chip => frame::CHIP,
            EntityKind::Wall => frame::WALL,
            EntityKind::Exit => frame::EXIT,
            EntityKind::OrangeDisk => frame::ORANGE_DISK,
            EntityKind::Terminal => frame::TERMINAL,
            EntityKind::SnikSnak => frame::SNIK_SNAK,
            EntityKind::Electron => frame::ELECTRON,
        }
    }

    /// Move the render position toward the logical cell at `speed`
    /// tiles per second. Returns true on the tick it arrives (snapped
    /// exactly onto the cell).
    pub fn glide(&mut self, speed: f32, dt: f32) -> bool {
        let step = speed * dt;
        let tx = self.x as f32;
        let ty = self.y as f32;
        if self.rx == tx && self.ry == ty {
            return false;
        }
        self.rx = approach(self.rx, tx, step);
        self.ry = approach(self.ry, ty, step);
        self.rx == tx && self.ry == ty
    }

    // ── Payload accessors ──

    pub fn as_rock(&self) -> Option<&RockBody> {
        match &self.kind {
            EntityKind::Rock(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_rock_mut(&mut self) -> Option<&mut RockBody> {
        match &mut self.kind {
            EntityKind::Rock(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerBody> {
        match &self.kind {
            EntityKind::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerBody> {
        match &mut self.kind {
            EntityKind::Player(p) => Some(p),
            _ => None,
        }
    }
}

fn approach(v: f32, target: f32, step: f32) -> f32 {
    if (target - v).abs() <= step {
        target
    } else if target > v {
        v + step
    } else {
        v - step
    }
}

// ══════════════════════════════════════════════
//  Tests
// ══════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glide_arrives_and_snaps_exactly() {
        let mut rock = Entity::rock(3, 2);
        rock.y = 3; // claimed the cell below; render lags a tile above
        assert!(!rock.glide(4.0, 0.0625)); // 0.25 tiles per step
        assert!(!rock.glide(4.0, 0.0625));
        assert!(!rock.glide(4.0, 0.0625));
        assert!(rock.glide(4.0, 0.0625)); // arrival on the 4th step
        assert_eq!(rock.render_pos(), (3.0, 3.0));
        // Settled: further glides report nothing.
        assert!(!rock.glide(4.0, 0.0625));
    }

    #[test]
    fn glide_overshoot_clamps_to_cell() {
        let mut p = Entity::player(0, 0);
        p.x = 1;
        assert!(p.glide(8.0, 1.0)); // one huge step
        assert_eq!(p.render_pos(), (1.0, 0.0));
    }

    #[test]
    fn tile_codes_map_to_kinds() {
        assert!(matches!(
            Entity::from_tile_code(0x01, 0, 0).map(|e| e.kind),
            Some(EntityKind::Rock(_))
        ));
        assert!(matches!(
            Entity::from_tile_code(0x04, 0, 0).map(|e| e.kind),
            Some(EntityKind::Pickup(_))
        ));
        assert!(matches!(
            Entity::from_tile_code(0x07, 0, 0).map(|e| e.kind),
            Some(EntityKind::Exit)
        ));
        // Both enemy-B codes collapse onto one variant.
        assert!(matches!(
            Entity::from_tile_code(0x18, 0, 0).map(|e| e.kind),
            Some(EntityKind::Electron)
        ));
        assert!(matches!(
            Entity::from_tile_code(0x19, 0, 0).map(|e| e.kind),
            Some(EntityKind::Electron)
        ));
        // Empty, player-start and unknown codes place nothing here.
        assert!(Entity::from_tile_code(0x00, 0, 0).is_none());
        assert!(Entity::from_tile_code(0x03, 0, 0).is_none());
        assert!(Entity::from_tile_code(0x7f, 0, 0).is_none());
    }

    #[test]
    fn walkable_occupants() {
        assert!(Entity::terrain(0, 0).is_walkable_occupant());
        assert!(Entity::pickup(0, 0).is_walkable_occupant());
        assert!(!Entity::rock(0, 0).is_walkable_occupant());
        assert!(!Entity::player(0, 0).is_walkable_occupant());
        assert!(!Entity::new(EntityKind::Wall, 0, 0).is_walkable_occupant());
        assert!(!Entity::new(EntityKind::Chip, 0, 0).is_walkable_occupant());

        let mut clearing = Entity::terrain(0, 0);
        clearing.kind = EntityKind::Terrain(TerrainBody {
            state: TerrainState::Clearing(Animation::new(anim::CLEAR_SEQ, 0.04, AnimPolicy::Once)),
        });
        assert!(!clearing.is_walkable_occupant());
    }

    #[test]
    fn roll_hosts_are_rocks_and_resting_pickups() {
        assert!(Entity::rock(0, 0).is_roll_host());
        assert!(Entity::pickup(0, 0).is_roll_host());
        assert!(!Entity::terrain(0, 0).is_roll_host());
        assert!(!Entity::new(EntityKind::Chip, 0, 0).is_roll_host());

        let mut collecting = Entity::pickup(0, 0);
        collecting.kind = EntityKind::Pickup(PickupBody {
            state: PickupState::Collecting(Animation::new(anim::COLLECT_SEQ, 0.04, AnimPolicy::Once)),
        });
        assert!(!collecting.is_roll_host());
    }

    #[test]
    fn underfoot_terrain_gives_up_its_cell() {
        let mut t = Entity::terrain(4, 4);
        assert!(t.occupies_cell());
        t.kind = EntityKind::Terrain(TerrainBody {
            state: TerrainState::Underfoot,
        });
        assert!(!t.occupies_cell());
        assert!(!t.is_walkable_occupant());
    }

    #[test]
    fn clearing_start_is_idempotent() {
        let mut t = TerrainBody { state: TerrainState::Intact };
        assert!(t.start_clearing());
        if let TerrainState::Clearing(a) = &mut t.state {
            a.advance(0.05);
        }
        // Triggering again neither restarts nor doubles anything.
        assert!(!t.start_clearing());
        match &t.state {
            TerrainState::Clearing(a) => assert_eq!(a.frame(), anim::CLEAR_SEQ[1]),
            other => panic!("terrain stopped clearing: {other:?}"),
        }
    }

    #[test]
    fn collecting_start_is_idempotent() {
        let mut p = PickupBody { state: PickupState::Resting };
        assert!(p.start_collecting());
        assert!(!p.start_collecting());
        assert!(matches!(p.state, PickupState::Collecting(_)));
    }

    #[test]
    fn player_frame_follows_action() {
        let mut e = Entity::player(0, 0);
        assert_eq!(e.frame(), frame::IDLE_RIGHT);

        let p = e.as_player_mut().unwrap();
        p.facing = Facing::Left;
        assert_eq!(e.frame(), frame::IDLE_LEFT);

        let p = e.as_player_mut().unwrap();
        p.walk = walk_cycle(Facing::Left);
        p.action = PlayerAction::Moving;
        assert_eq!(e.frame(), frame::WALK_LEFT);

        let p = e.as_player_mut().unwrap();
        p.action = PlayerAction::Digging(dig_pose(MoveDir::Down));
        assert_eq!(e.frame(), frame::DIG_DOWN);
    }
}

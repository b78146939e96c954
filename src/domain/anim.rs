/// Shared animation component.
///
/// Every animated entity variant advances the same way: a fixed frame
/// sequence stepped at a fixed per-frame duration, with a completion
/// policy deciding what happens at the end of the sequence. Variants
/// differ only in which sequence they play and what they do on
/// completion, so the stepping logic lives here once instead of being
/// re-implemented per variant.

// ── Frame identifiers ──
//
// Abstract frame ids consumed by the render theme. Animated sequences
// occupy a contiguous range starting at their base id, so the theme can
// recover the phase as `frame - base`.
pub mod frame {
    // Resting / static poses
    pub const ROCK: u16 = 1;
    pub const TERRAIN: u16 = 2;
    pub const PICKUP: u16 = 3;
    pub const CHIP: u16 = 4;
    pub const WALL: u16 = 5;
    pub const EXIT: u16 = 6;
    pub const ORANGE_DISK: u16 = 7;
    pub const TERMINAL: u16 = 8;
    pub const SNIK_SNAK: u16 = 9;
    pub const ELECTRON: u16 = 10;
    pub const IDLE_LEFT: u16 = 11;
    pub const IDLE_RIGHT: u16 = 12;

    // Sequence bases
    pub const WALK_LEFT: u16 = 20; // 3 phases
    pub const WALK_RIGHT: u16 = 24; // 3 phases
    pub const DIG_LEFT: u16 = 28;
    pub const DIG_RIGHT: u16 = 29;
    pub const DIG_UP: u16 = 30;
    pub const DIG_DOWN: u16 = 31;
    pub const ROLL: u16 = 34; // 3 phases
    pub const CLEAR: u16 = 40; // 5 phases
    pub const COLLECT: u16 = 48; // 7 phases
}

// ── Sequences ──

/// Walk cycle: out-and-back over three stride poses.
pub const WALK_LEFT_CYCLE: &[u16] = &[
    frame::WALK_LEFT,
    frame::WALK_LEFT + 1,
    frame::WALK_LEFT + 2,
    frame::WALK_LEFT + 1,
    frame::WALK_LEFT,
];
pub const WALK_RIGHT_CYCLE: &[u16] = &[
    frame::WALK_RIGHT,
    frame::WALK_RIGHT + 1,
    frame::WALK_RIGHT + 2,
    frame::WALK_RIGHT + 1,
    frame::WALK_RIGHT,
];

/// Rolling uses the same three poses in both directions; the leftward
/// sequence plays them in reverse so the rotation reads correctly.
pub const ROLL_RIGHT_SEQ: &[u16] = &[frame::ROLL, frame::ROLL + 1, frame::ROLL + 2];
pub const ROLL_LEFT_SEQ: &[u16] = &[frame::ROLL + 2, frame::ROLL + 1, frame::ROLL];

pub const CLEAR_SEQ: &[u16] = &[
    frame::CLEAR,
    frame::CLEAR + 1,
    frame::CLEAR + 2,
    frame::CLEAR + 3,
    frame::CLEAR + 4,
];
pub const COLLECT_SEQ: &[u16] = &[
    frame::COLLECT,
    frame::COLLECT + 1,
    frame::COLLECT + 2,
    frame::COLLECT + 3,
    frame::COLLECT + 4,
    frame::COLLECT + 5,
    frame::COLLECT + 6,
];

pub const DIG_LEFT_POSE: &[u16] = &[frame::DIG_LEFT];
pub const DIG_RIGHT_POSE: &[u16] = &[frame::DIG_RIGHT];
pub const DIG_UP_POSE: &[u16] = &[frame::DIG_UP];
pub const DIG_DOWN_POSE: &[u16] = &[frame::DIG_DOWN];

// ── Frame timing ──

/// Terrain crumble and pickup collection share the fast effect rate.
pub const CLEAR_FRAME_TIME: f32 = 0.04;
pub const COLLECT_FRAME_TIME: f32 = 0.04;
pub const ROLL_FRAME_TIME: f32 = 0.1;
pub const WALK_FRAME_TIME: f32 = 0.15;
/// The directional dig pose holds for one walk-frame beat.
pub const DIG_POSE_TIME: f32 = 0.15;

// ── Animation state ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnimPolicy {
    /// Wrap to the first frame and keep going.
    Loop,
    /// Hold the last frame; `advance` reports completion exactly once.
    Once,
}

#[derive(Clone, Debug)]
pub struct Animation {
    frames: &'static [u16],
    frame_time: f32,
    policy: AnimPolicy,
    cursor: usize,
    acc: f32,
    finished: bool,
}

impl Animation {
    pub fn new(frames: &'static [u16], frame_time: f32, policy: AnimPolicy) -> Self {
        debug_assert!(!frames.is_empty());
        Animation {
            frames,
            frame_time,
            policy,
            cursor: 0,
            acc: 0.0,
            finished: false,
        }
    }

    /// Accumulate elapsed time and step frames. Returns true when a full
    /// pass over the sequence just completed (every wrap for `Loop`,
    /// exactly once for `Once`).
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.finished {
            debug_assert!(false, "advance on a finished animation");
            return false;
        }
        self.acc += dt;
        let mut completed = false;
        while self.acc >= self.frame_time {
            self.acc -= self.frame_time;
            self.cursor += 1;
            if self.cursor >= self.frames.len() {
                match self.policy {
                    AnimPolicy::Loop => {
                        self.cursor = 0;
                        completed = true;
                    }
                    AnimPolicy::Once => {
                        self.cursor = self.frames.len() - 1;
                        self.finished = true;
                        completed = true;
                        break;
                    }
                }
            }
        }
        completed
    }

    #[inline]
    pub fn frame(&self) -> u16 {
        self.frames[self.cursor]
    }
}

// ══════════════════════════════════════════════
//  Tests
// ══════════════════════════════════════════════

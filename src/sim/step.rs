/// The step function: advances a level by one tick.
///
/// Processing order:
///   1. Player intent (one command per tick, dropped while busy)
///   2. Rock decisions (throttled gravity / roll-off, insertion order)
///   3. Advancement: render glides + animations, completion effects
///   4. Inactive-entity sweep
///
/// `dt` is the tick length in seconds; every speed and timer is in
/// seconds too, so changing the tick rate rescales nothing.
///
/// Transitions claim their destination cell in the grid index the
/// moment they start. The render position glides after the logical
/// cell and the transition "completes" when it arrives; completions
/// may chain (a landed rock re-evaluates gravity immediately).

use crate::domain::entity::{
    dig_pose, walk_cycle, roll_anim, EntityId, EntityKind, FrameInput, MoveDir, PickupState,
    PlayerAction, RockState, RollDir, TerrainState,
};
use crate::domain::physics::{self, FallDecision, Probe};
use super::event::GameEvent;
use super::level::{Level, PendingEffect};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(level: &mut Level, input: FrameInput, dt: f32) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();
    level.tick += 1;

    if level.message_timer > 0 {
        level.message_timer -= 1;
        if level.message_timer == 0 {
            level.message.clear();
        }
    }

    resolve_player_intent(level, input, &mut events);
    resolve_rock_decisions(level, dt, &mut events);
    advance_player(level, input, dt, &mut events);
    advance_rocks(level, dt, &mut events);
    advance_clearings(level, dt, &mut events);
    level.sweep_inactive();

    events
}

// ══════════════════════════════════════════════════════════════
// Player intent
// ══════════════════════════════════════════════════════════════

fn player_busy(level: &Level) -> bool {
    let body = match level.player_entity().and_then(|p| p.as_player()) {
        Some(b) => b,
        None => return true,
    };
    !matches!(body.action, PlayerAction::Idle)
}

fn resolve_player_intent(level: &mut Level, input: FrameInput, events: &mut Vec<GameEvent>) {
    // Mid-step and mid-dig commands are dropped, not queued.
    if player_busy(level) {
        return;
    }
    let dir = match input.movement {
        Some(d) => d,
        None => return,
    };
    let pid = match level.player {
        Some(p) => p,
        None => return,
    };
    let (px, py) = {
        let p = &level.entities[pid];
        (p.x, p.y)
    };
    let (dx, dy) = dir.delta();
    let (tx, ty) = (px + dx, py + dy);

    if input.dig {
        resolve_dig(level, pid, dir, tx, ty, events);
    } else {
        resolve_step_into(level, pid, dir, tx, ty, events);
    }
}

/// Dig at the neighboring cell without entering it. Only intact
/// terrain and resting pickups respond; digging air, walls or anything
/// already mid-animation is a complete no-op (no pose, no busy window).
fn resolve_dig(
    level: &mut Level,
    pid: EntityId,
    dir: MoveDir,
    tx: i32,
    ty: i32,
    events: &mut Vec<GameEvent>,
) {
    let target = match level.grid.occupant_at(tx, ty) {
        Some(t) => t,
        None => return,
    };
    let started = match &mut level.entities[target].kind {
        EntityKind::Terrain(t) => t.start_clearing(),
        EntityKind::Pickup(p) => p.start_collecting(),
        _ => false,
    };
    if !started {
        return;
    }
    events.push(GameEvent::DigStarted { x: tx, y: ty });

    if let Some(body) = level.entities[pid].as_player_mut() {
        if let Some(f) = dir.facing() {
            body.facing = f;
        }
        body.action = PlayerAction::Digging(dig_pose(dir));
        body.cycle_hold = false;
    }
}

/// Step toward the neighboring cell, consuming whatever walkable
/// occupant is there. Blocked directions fail silently.
fn resolve_step_into(
    level: &mut Level,
    pid: EntityId,
    dir: MoveDir,
    tx: i32,
    ty: i32,
    events: &mut Vec<GameEvent>,
) {
    // The open exit admits the player even though it blocks walkability.
    if let Some(tid) = level.grid.occupant_at(tx, ty) {
        if matches!(level.entities[tid].kind, EntityKind::Exit) && level.exit_open {
            level.entities[tid].active = false;
            level.grid.remove_at(tx, ty);
            level.pending.push(PendingEffect::EnterExit);
            begin_player_step(level, pid, dir, tx, ty);
            return;
        }
    }

    if !level.walkable(tx, ty) {
        return;
    }

    if let Some(tid) = level.grid.occupant_at(tx, ty) {
        let is_pickup = matches!(level.entities[tid].kind, EntityKind::Pickup(_));
        if is_pickup {
            // Walked-over pickups are collected instantly, no animation.
            level.entities[tid].active = false;
            level.grid.remove_at(tx, ty);
            events.push(GameEvent::PickupCollected { x: tx, y: ty });
            register_collection(level, events);
        } else {
            // walkable() admits nothing else here but intact terrain:
            // it yields its cell now and lingers visually until the
            // step that displaced it arrives.
            if let EntityKind::Terrain(t) = &mut level.entities[tid].kind {
                t.state = TerrainState::Underfoot;
            }
            level.grid.remove_at(tx, ty);
            level.pending.push(PendingEffect::ClearTerrain { entity: tid });
        }
    }

    begin_player_step(level, pid, dir, tx, ty);
}

fn begin_player_step(level: &mut Level, pid: EntityId, dir: MoveDir, tx: i32, ty: i32) {
    let (px, py) = {
        let p = &level.entities[pid];
        (p.x, p.y)
    };
    level.grid.relocate((px, py), (tx, ty));

    let e = &mut level.entities[pid];
    e.x = tx;
    e.y = ty;
    if let Some(body) = e.as_player_mut() {
        if let Some(f) = dir.facing() {
            if f != body.facing {
                body.facing = f;
                body.cycle_hold = false;
            }
        }
        // A held key chains steps without restarting the stride.
        if !body.cycle_hold {
            body.walk = walk_cycle(body.facing);
        }
        body.action = PlayerAction::Moving;
        body.cycle_hold = false;
    }
}

fn register_collection(level: &mut Level, events: &mut Vec<GameEvent>) {
    level.collected += 1;
    if !level.exit_open && level.collected >= level.required {
        level.exit_open = true;
        events.push(GameEvent::AllPickupsCollected);
    }
}

// ══════════════════════════════════════════════════════════════
// Rock decisions (throttled)
// ══════════════════════════════════════════════════════════════

fn resolve_rock_decisions(level: &mut Level, dt: f32, events: &mut Vec<GameEvent>) {
    if level.freeze_rocks {
        return;
    }
    let base_interval = level.speed.gravity_interval;

    for i in 0..level.entities.len() {
        if !level.entities[i].active {
            continue;
        }
        let fired = {
            let rock = match level.entities[i].as_rock_mut() {
                Some(r) => r,
                None => continue,
            };
            rock.gravity_timer += dt;
            // In-flight rocks only need the timer for bookkeeping, so
            // the check runs at half cadence while falling or rolling.
            let interval = match rock.state {
                RockState::Resting => base_interval,
                _ => base_interval * 2.0,
            };
            if rock.gravity_timer < interval {
                false
            } else {
                rock.gravity_timer = 0.0;
                matches!(rock.state, RockState::Resting)
            }
        };
        if !fired {
            continue;
        }

        let (x, y) = {
            let e = &level.entities[i];
            (e.x, e.y)
        };
        let decision = physics::resolve_rock(&|px, py| level.probe_at(px, py), x, y);
        match decision {
            FallDecision::Fall => {
                events.push(GameEvent::RockFallStarted { x, y });
                begin_fall(level, i);
            }
            FallDecision::Roll(dir) => {
                events.push(GameEvent::RockRollStarted { x, y });
                begin_roll(level, i, dir);
            }
            FallDecision::Rest => {}
        }
    }
}

/// Claim the cell below and start the drop. The render position stays
/// a tile behind and glides down after it.
fn begin_fall(level: &mut Level, i: EntityId) {
    let (x, y) = {
        let e = &level.entities[i];
        (e.x, e.y)
    };
    level.grid.relocate((x, y), (x, y + 1));
    let e = &mut level.entities[i];
    e.y += 1;
    if let Some(rock) = e.as_rock_mut() {
        rock.state = RockState::Falling;
    }
}

fn begin_roll(level: &mut Level, i: EntityId, dir: RollDir) {
    let (x, y) = {
        let e = &level.entities[i];
        (e.x, e.y)
    };
    level.grid.relocate((x, y), (x + dir.dx(), y));
    let e = &mut level.entities[i];
    e.x += dir.dx();
    if let Some(rock) = e.as_rock_mut() {
        rock.state = RockState::Rolling(dir);
        rock.roll_anim = Some(roll_anim(dir));
    }
}

// ══════════════════════════════════════════════════════════════
// Advancement: player
// ══════════════════════════════════════════════════════════════

fn advance_player(level: &mut Level, input: FrameInput, dt: f32, events: &mut Vec<GameEvent>) {
    let pid = match level.player {
        Some(p) => p,
        None => return,
    };
    let move_speed = level.speed.move_speed;

    // Animations: stride while stepping (and between chained steps
    // while the key stays down), dig pose until it expires.
    {
        let e = &mut level.entities[pid];
        if let Some(body) = e.as_player_mut() {
            let mut dig_done = false;
            match &mut body.action {
                PlayerAction::Moving => {
                    body.walk.advance(dt);
                }
                PlayerAction::Digging(pose) => {
                    dig_done = pose.advance(dt);
                }
                PlayerAction::Idle => {
                    if body.cycle_hold {
                        if input.movement.is_some() {
                            body.walk.advance(dt);
                        } else {
                            body.cycle_hold = false;
                        }
                    }
                }
            }
            if dig_done {
                body.action = PlayerAction::Idle;
                body.cycle_hold = false;
            }
        }
    }

    let moving = level.entities[pid]
        .as_player()
        .map(|b| matches!(b.action, PlayerAction::Moving))
        .unwrap_or(false);
    if !moving {
        return;
    }
    if !level.entities[pid].glide(move_speed, dt) {
        return;
    }

    // Step complete: settle, then fire whatever waited on the arrival.
    let (x, y) = {
        let e = &level.entities[pid];
        (e.x, e.y)
    };
    if let Some(body) = level.entities[pid].as_player_mut() {
        body.action = PlayerAction::Idle;
        body.cycle_hold = input.movement.is_some();
    }
    events.push(GameEvent::PlayerStepped { x, y });

    let effects: Vec<PendingEffect> = level.pending.drain(..).collect();
    for eff in effects {
        match eff {
            PendingEffect::ClearTerrain { entity } => {
                // Its cell already belongs to the player; just retire it.
                let (tx, ty) = {
                    let t = &level.entities[entity];
                    (t.x, t.y)
                };
                level.entities[entity].active = false;
                events.push(GameEvent::TerrainCleared { x: tx, y: ty });
            }
            PendingEffect::EnterExit => {
                events.push(GameEvent::LevelCompleted);
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Advancement: rocks
// ══════════════════════════════════════════════════════════════

fn advance_rocks(level: &mut Level, dt: f32, events: &mut Vec<GameEvent>) {
    let fall_speed = level.speed.fall_speed;
    let roll_speed = level.speed.roll_speed;

    for i in 0..level.entities.len() {
        if !level.entities[i].active {
            continue;
        }
        let state = match level.entities[i].as_rock() {
            Some(r) => r.state,
            None => continue,
        };
        match state {
            RockState::Resting => {}
            RockState::Falling => {
                if level.entities[i].glide(fall_speed, dt) {
                    on_fall_arrival(level, i, events);
                }
            }
            RockState::Rolling(_) => {
                if let Some(rock) = level.entities[i].as_rock_mut() {
                    if let Some(a) = rock.roll_anim.as_mut() {
                        a.advance(dt);
                    }
                }
                if level.entities[i].glide(roll_speed, dt) {
                    on_roll_arrival(level, i, events);
                }
            }
        }
    }
}

fn on_fall_arrival(level: &mut Level, i: EntityId, events: &mut Vec<GameEvent>) {
    let (x, y) = {
        let e = &level.entities[i];
        (e.x, e.y)
    };

    // Keep dropping while the column below stays clear; the glide
    // carries straight on without waiting for the throttle.
    if !level.freeze_rocks && level.probe_at(x, y + 1) == Probe::Empty {
        level.grid.relocate((x, y), (x, y + 1));
        level.entities[i].y += 1;
        return;
    }

    if let Some(rock) = level.entities[i].as_rock_mut() {
        rock.state = RockState::Resting;
    }
    events.push(GameEvent::RockLanded { x, y });

    if level.freeze_rocks {
        return;
    }
    // Landed on a rounded host: shed to the side right away.
    if level.probe_at(x, y + 1) == Probe::RollHost {
        let choice = physics::roll_choice(&|px, py| level.probe_at(px, py), x, y);
        if let Some(dir) = choice {
            events.push(GameEvent::RockRollStarted { x, y });
            begin_roll(level, i, dir);
        }
    }
}

fn on_roll_arrival(level: &mut Level, i: EntityId, events: &mut Vec<GameEvent>) {
    // Back to the resting sprite, then see where gravity wants it.
    if let Some(rock) = level.entities[i].as_rock_mut() {
        rock.state = RockState::Resting;
        rock.roll_anim = None;
    }
    if level.freeze_rocks {
        return;
    }

    let (x, y) = {
        let e = &level.entities[i];
        (e.x, e.y)
    };
    let decision = physics::resolve_rock(&|px, py| level.probe_at(px, py), x, y);
    match decision {
        FallDecision::Fall => {
            events.push(GameEvent::RockFallStarted { x, y });
            begin_fall(level, i);
        }
        FallDecision::Roll(dir) => {
            events.push(GameEvent::RockRollStarted { x, y });
            begin_roll(level, i, dir);
        }
        FallDecision::Rest => {}
    }
}

// ══════════════════════════════════════════════════════════════
// Advancement: terrain clears / pickup collections
// ══════════════════════════════════════════════════════════════

fn advance_clearings(level: &mut Level, dt: f32, events: &mut Vec<GameEvent>) {
    for i in 0..level.entities.len() {
        if !level.entities[i].active {
            continue;
        }
        let (x, y) = {
            let e = &level.entities[i];
            (e.x, e.y)
        };

        let mut cleared = false;
        let mut collected = false;
        match &mut level.entities[i].kind {
            EntityKind::Terrain(t) => {
                if let TerrainState::Clearing(a) = &mut t.state {
                    cleared = a.advance(dt);
                }
            }
            EntityKind::Pickup(p) => {
                if let PickupState::Collecting(a) = &mut p.state {
                    collected = a.advance(dt);
                }
            }
            _ => {}
        }

        if cleared {
            level.entities[i].active = false;
            level.grid.remove_at(x, y);
            events.push(GameEvent::TerrainCleared { x, y });
        }
        if collected {
            level.entities[i].active = false;
            level.grid.remove_at(x, y);
            events.push(GameEvent::PickupCollected { x, y });
            register_collection(level, events);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

/// Events emitted during a simulation step.
/// The outer loop consumes these for messages and level flow; everything
/// else is free to ignore them.

#[derive(Clone, PartialEq, Eq, Debug)]
#[allow(dead_code)]
pub enum GameEvent {
    PickupCollected { x: i32, y: i32 },
    AllPickupsCollected,
    TerrainCleared { x: i32, y: i32 },
    DigStarted { x: i32, y: i32 },
    RockFallStarted { x: i32, y: i32 },
    RockLanded { x: i32, y: i32 },
    RockRollStarted { x: i32, y: i32 },
    PlayerStepped { x: i32, y: i32 },
    LevelCompleted,
}

// Domain-level arena entities and snapshot types.

use std::collections::BTreeMap;

use super::ports::PlayerBody;

pub type PlayerId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Zero,
    One,
}

impl Team {
    pub fn index(self) -> usize {
        match self {
            Team::Zero => 0,
            Team::One => 1,
        }
    }

    pub fn opponent(self) -> Team {
        match self {
            Team::Zero => Team::One,
            Team::One => Team::Zero,
        }
    }
}

/// Per-player risk ladder driven by collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Normal,
    Risk,
    Dire,
    Dead,
}

/// Category tag for every shape in the arena, resolved through the session side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeCategory {
    Wall,
    Player,
    Center,
}

pub struct Player {
    pub id: PlayerId,
    pub team: Team,
    pub state: PlayerState,

    // Physics-owned handles; position is always read back through these.
    pub body: PlayerBody,
}

/// Team score pair indexed by `Team::index`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score(pub [u32; 2]);

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub pos: Vec2,
    pub team: Team,
    pub state: PlayerState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    pub score: Score,
}

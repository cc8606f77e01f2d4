// Domain layer: core arena rules and types.

pub mod collision;
pub mod ports;
pub mod state;
pub mod teams;
pub mod tuning;

pub use ports::{BodyHandle, Contact, PhysicsWorld, PlayerBody, ShapeHandle};
pub use state::{
    Player, PlayerId, PlayerSnapshot, PlayerState, Score, ShapeCategory, Snapshot, Team, Vec2,
};

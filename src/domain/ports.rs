use super::state::Vec2;

/// Opaque handle to a rigid body owned by the physics world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

/// Opaque handle to a collision shape owned by the physics world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeHandle(pub u64);

/// Everything the physics world allocated for a single player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerBody {
    pub body: BodyHandle,
    pub shape: ShapeHandle,
}

/// One touching pair as seen from the queried body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    /// `None` for shapes attached to the static world (walls, center).
    pub other_body: Option<BodyHandle>,
    pub other_shape: ShapeHandle,
    /// True only on the step the pair started touching.
    pub first: bool,
}

// Port for the rigid-body engine driven by the simulation loop.
//
// Allocation failures inside an implementation are fatal; no method reports them.
pub trait PhysicsWorld: Send + 'static {
    fn add_wall_segment(&mut self, a: Vec2, b: Vec2, thickness: f32) -> ShapeHandle;
    fn add_center_obstacle(&mut self, radius: f32) -> ShapeHandle;

    /// Creates a dynamic circle body at `position` plus its cursor proxy and drag constraint.
    fn spawn_player(&mut self, position: Vec2, radius: f32) -> PlayerBody;
    /// Releases the body, its shape, its proxy and its constraint together.
    fn despawn_player(&mut self, body: PlayerBody);

    fn step(&mut self, dt: f32);
    fn contacts(&self, body: BodyHandle) -> Vec<Contact>;

    fn position(&self, body: BodyHandle) -> Option<Vec2>;
    /// Teleports the body and clears its velocity.
    fn set_position(&mut self, body: BodyHandle, position: Vec2);
    fn set_drag_target(&mut self, body: BodyHandle, target: Vec2);
    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec2);
}

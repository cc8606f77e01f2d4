use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::domain::{BodyHandle, Contact, PhysicsWorld, PlayerBody, ShapeHandle, Vec2};

#[derive(Default)]
struct ScriptState {
    next_handle: u64,
    static_shapes: usize,
    positions: HashMap<BodyHandle, Vec2>,
    drag_targets: HashMap<BodyHandle, Vec2>,
    spawned: Vec<PlayerBody>,
    despawned: Vec<PlayerBody>,
    steps: usize,

    // Pairs the test wants touching: (body, other shape, other body).
    touching: BTreeSet<(BodyHandle, ShapeHandle, Option<BodyHandle>)>,
    // Pairs that were touching at the end of the previous step.
    previous: HashSet<(BodyHandle, ShapeHandle)>,
    // Contacts published by the last step.
    published: HashMap<BodyHandle, Vec<Contact>>,
}

impl ScriptState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

// Physics fake for deterministic use-case tests: contacts are scripted, not simulated.
#[derive(Clone, Default)]
pub(crate) struct ScriptedPhysics {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedPhysics {
    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().expect("script mutex poisoned")
    }

    /// Marks `body` as touching `other_shape` from the next step on.
    pub(crate) fn touch(
        &self,
        body: BodyHandle,
        other_shape: ShapeHandle,
        other_body: Option<BodyHandle>,
    ) {
        self.lock().touching.insert((body, other_shape, other_body));
    }

    pub(crate) fn release(&self, body: BodyHandle, other_shape: ShapeHandle) {
        self.lock()
            .touching
            .retain(|(b, s, _)| !(*b == body && *s == other_shape));
    }

    pub(crate) fn place(&self, body: BodyHandle, position: Vec2) {
        self.lock().positions.insert(body, position);
    }

    pub(crate) fn drag_target(&self, body: BodyHandle) -> Option<Vec2> {
        self.lock().drag_targets.get(&body).copied()
    }

    pub(crate) fn static_shapes(&self) -> usize {
        self.lock().static_shapes
    }

    pub(crate) fn spawned(&self) -> Vec<PlayerBody> {
        self.lock().spawned.clone()
    }

    pub(crate) fn despawned(&self) -> Vec<PlayerBody> {
        self.lock().despawned.clone()
    }

    pub(crate) fn steps(&self) -> usize {
        self.lock().steps
    }
}

impl PhysicsWorld for ScriptedPhysics {
    fn add_wall_segment(&mut self, _a: Vec2, _b: Vec2, _thickness: f32) -> ShapeHandle {
        let mut state = self.lock();
        state.static_shapes += 1;
        ShapeHandle(state.next_handle())
    }

    fn add_center_obstacle(&mut self, _radius: f32) -> ShapeHandle {
        let mut state = self.lock();
        state.static_shapes += 1;
        ShapeHandle(state.next_handle())
    }

    fn spawn_player(&mut self, position: Vec2, _radius: f32) -> PlayerBody {
        let mut state = self.lock();
        let body = PlayerBody {
            body: BodyHandle(state.next_handle()),
            shape: ShapeHandle(state.next_handle()),
        };
        state.positions.insert(body.body, position);
        state.spawned.push(body);
        body
    }

    fn despawn_player(&mut self, body: PlayerBody) {
        let mut state = self.lock();
        state.positions.remove(&body.body);
        state.drag_targets.remove(&body.body);
        state
            .touching
            .retain(|(b, s, _)| *b != body.body && *s != body.shape);
        state.despawned.push(body);
    }

    fn step(&mut self, _dt: f32) {
        let mut state = self.lock();
        let mut published: HashMap<BodyHandle, Vec<Contact>> = HashMap::new();
        let mut now = HashSet::new();
        for &(body, other_shape, other_body) in &state.touching {
            published.entry(body).or_default().push(Contact {
                other_body,
                other_shape,
                first: !state.previous.contains(&(body, other_shape)),
            });
            now.insert((body, other_shape));
        }
        state.published = published;
        state.previous = now;
        state.steps += 1;
    }

    fn contacts(&self, body: BodyHandle) -> Vec<Contact> {
        self.lock().published.get(&body).cloned().unwrap_or_default()
    }

    fn position(&self, body: BodyHandle) -> Option<Vec2> {
        self.lock().positions.get(&body).copied()
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec2) {
        let mut state = self.lock();
        if let Some(slot) = state.positions.get_mut(&body) {
            *slot = position;
        }
    }

    fn set_drag_target(&mut self, body: BodyHandle, target: Vec2) {
        self.lock().drag_targets.insert(body, target);
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec2) {
        // Unit mass over a unit step: the impulse is a displacement.
        let mut state = self.lock();
        if let Some(slot) = state.positions.get_mut(&body) {
            slot.x += impulse.x;
            slot.y += impulse.y;
        }
    }
}

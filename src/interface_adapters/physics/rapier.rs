// rapier2d binding for the physics port.

use crate::domain::tuning::arena::ArenaTuning;
use crate::domain::{BodyHandle, Contact, PhysicsWorld, PlayerBody, ShapeHandle, Vec2};
use rapier2d::prelude::*;
use std::collections::{BTreeSet, HashMap};

// Wall and center obstacle material.
const STATIC_RESTITUTION: f32 = 1.0;
const STATIC_FRICTION: f32 = 1.0;

const PLAYER_RESTITUTION: f32 = 0.9;
const PLAYER_FRICTION: f32 = 0.1;

// Spring pulling each player toward its cursor proxy. The spring and the damping are
// capped separately so a body held against a wall still sheds its bounce.
const DRAG_STIFFNESS: f32 = 100.0;
const DRAG_DAMPING: f32 = 10.0;

fn body_handle(handle: RigidBodyHandle) -> BodyHandle {
    let (index, generation) = handle.into_raw_parts();
    BodyHandle(((generation as u64) << 32) | index as u64)
}

fn rigid_body(handle: BodyHandle) -> RigidBodyHandle {
    RigidBodyHandle::from_raw_parts(handle.0 as u32, (handle.0 >> 32) as u32)
}

fn shape_handle(handle: ColliderHandle) -> ShapeHandle {
    let (index, generation) = handle.into_raw_parts();
    ShapeHandle(((generation as u64) << 32) | index as u64)
}

fn collider(handle: ShapeHandle) -> ColliderHandle {
    ColliderHandle::from_raw_parts(handle.0 as u32, (handle.0 >> 32) as u32)
}

fn to_vector(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

fn drag_force(offset: Vector<Real>, velocity: Vector<Real>, max_force: f32) -> Vector<Real> {
    let spring = (offset * DRAG_STIFFNESS).cap_magnitude(max_force);
    let damping = (-velocity * DRAG_DAMPING).cap_magnitude(max_force);
    spring + damping
}

pub struct RapierPhysics {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    player_mass: f32,
    drag_max_force: f32,

    // Player body -> kinematic proxy holding its cursor target.
    proxies: HashMap<RigidBodyHandle, RigidBodyHandle>,
    // Collider pairs touching after the last step, smaller handle first.
    touching: BTreeSet<(ShapeHandle, ShapeHandle)>,
    // Contacts of the last step, per player body.
    contacts: HashMap<RigidBodyHandle, Vec<Contact>>,
}

impl RapierPhysics {
    /// Empty top-down world (no gravity); static shapes are added by the session.
    pub fn new(tuning: &ArenaTuning) -> Self {
        Self {
            gravity: vector![0.0, 0.0],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            player_mass: tuning.player_mass,
            drag_max_force: tuning.drag_max_force,
            proxies: HashMap::new(),
            touching: BTreeSet::new(),
            contacts: HashMap::new(),
        }
    }

    fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    // Spring force toward each proxy plus velocity damping, each clamped to the drag limit,
    // applied as an impulse over `dt`.
    fn apply_drag(&mut self, dt: f32) {
        let impulses: Vec<(BodyHandle, Vec2)> = self
            .proxies
            .iter()
            .filter_map(|(&body, &proxy)| {
                let target = *self.bodies.get(proxy)?.translation();
                let player = self.bodies.get(body)?;
                let offset = target - *player.translation();
                let impulse = drag_force(offset, *player.linvel(), self.drag_max_force) * dt;
                Some((body_handle(body), Vec2::new(impulse.x, impulse.y)))
            })
            .collect();

        for (body, impulse) in impulses {
            self.apply_impulse(body, impulse);
        }
    }

    // Diffs the touching pairs against the previous step to flag first contacts.
    fn refresh_contacts(&mut self) {
        let touching: BTreeSet<(ShapeHandle, ShapeHandle)> = self
            .narrow_phase
            .contact_pairs()
            .filter(|pair| pair.has_any_active_contact)
            .map(|pair| {
                let (a, b) = (shape_handle(pair.collider1), shape_handle(pair.collider2));
                if a <= b { (a, b) } else { (b, a) }
            })
            .collect();

        self.contacts.clear();
        for &(a, b) in &touching {
            let first = !self.touching.contains(&(a, b));
            self.record_contact(a, b, first);
            self.record_contact(b, a, first);
        }
        self.touching = touching;
    }

    fn record_contact(&mut self, own: ShapeHandle, other: ShapeHandle, first: bool) {
        let Some(body) = self.colliders.get(collider(own)).and_then(|c| c.parent()) else {
            return;
        };
        if !self.proxies.contains_key(&body) {
            return;
        }
        let other_body = self
            .colliders
            .get(collider(other))
            .and_then(|c| c.parent())
            .map(body_handle);

        self.contacts.entry(body).or_default().push(Contact {
            other_body,
            other_shape: other,
            first,
        });
    }
}

impl PhysicsWorld for RapierPhysics {
    fn add_wall_segment(&mut self, a: Vec2, b: Vec2, thickness: f32) -> ShapeHandle {
        let wall = ColliderBuilder::new(SharedShape::capsule(
            point![a.x, a.y],
            point![b.x, b.y],
            0.5 * thickness,
        ))
        .restitution(STATIC_RESTITUTION)
        .friction(STATIC_FRICTION)
        .build();
        shape_handle(self.colliders.insert(wall))
    }

    fn add_center_obstacle(&mut self, radius: f32) -> ShapeHandle {
        let center = ColliderBuilder::ball(radius)
            .restitution(STATIC_RESTITUTION)
            .friction(STATIC_FRICTION)
            .build();
        shape_handle(self.colliders.insert(center))
    }

    fn spawn_player(&mut self, position: Vec2, radius: f32) -> PlayerBody {
        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(position))
            .ccd_enabled(true)
            .build();
        let body = self.bodies.insert(body);

        let shape = ColliderBuilder::ball(radius)
            .restitution(PLAYER_RESTITUTION)
            .friction(PLAYER_FRICTION)
            .mass(self.player_mass)
            .build();
        let shape = self
            .colliders
            .insert_with_parent(shape, body, &mut self.bodies);

        // The proxy starts on the body so a fresh player stays put.
        let proxy = RigidBodyBuilder::kinematic_position_based()
            .translation(to_vector(position))
            .build();
        let proxy = self.bodies.insert(proxy);
        self.proxies.insert(body, proxy);

        PlayerBody {
            body: body_handle(body),
            shape: shape_handle(shape),
        }
    }

    fn despawn_player(&mut self, player: PlayerBody) {
        let body = rigid_body(player.body);
        if let Some(proxy) = self.proxies.remove(&body) {
            self.remove_body(proxy);
        }
        self.remove_body(body);
        self.contacts.remove(&body);
        self.touching
            .retain(|(a, b)| *a != player.shape && *b != player.shape);
    }

    fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.apply_drag(dt);
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        self.refresh_contacts();
    }

    fn contacts(&self, body: BodyHandle) -> Vec<Contact> {
        self.contacts
            .get(&rigid_body(body))
            .cloned()
            .unwrap_or_default()
    }

    fn position(&self, body: BodyHandle) -> Option<Vec2> {
        let translation = self.bodies.get(rigid_body(body))?.translation();
        Some(Vec2::new(translation.x, translation.y))
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec2) {
        let handle = rigid_body(body);
        if let Some(player) = self.bodies.get_mut(handle) {
            player.set_translation(to_vector(position), true);
            player.set_linvel(vector![0.0, 0.0], true);
            player.set_angvel(0.0, true);
        }
        // Otherwise the spring would pull the body straight back.
        if let Some(proxy) = self
            .proxies
            .get(&handle)
            .and_then(|proxy| self.bodies.get_mut(*proxy))
        {
            proxy.set_translation(to_vector(position), true);
        }
    }

    fn set_drag_target(&mut self, body: BodyHandle, target: Vec2) {
        if let Some(proxy) = self
            .proxies
            .get(&rigid_body(body))
            .and_then(|proxy| self.bodies.get_mut(*proxy))
        {
            proxy.set_translation(to_vector(target), true);
        }
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec2) {
        if let Some(player) = self.bodies.get_mut(rigid_body(body)) {
            player.apply_impulse(to_vector(impulse), true);
        }
    }
}

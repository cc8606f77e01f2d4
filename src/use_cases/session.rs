// Shared session state: the player registry, the score and the physics world behind them.
//
// Every method here runs under the `SessionManager` lock; nothing in this module awaits.

use crate::domain::collision::{self, ContactEvent};
use crate::domain::teams;
use crate::domain::tuning::arena::ArenaTuning;
use crate::domain::{
    BodyHandle, PhysicsWorld, Player, PlayerId, PlayerSnapshot, PlayerState, Score,
    ShapeCategory, ShapeHandle, Snapshot, Vec2,
};
use crate::use_cases::types::{ClientCommand, ConfigPayload, OutboundEvent, TickReport};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Static shapes created for the arena boundary and obstacle.
#[derive(Debug, Clone)]
pub struct ArenaShapes {
    pub walls: Vec<ShapeHandle>,
    pub center: ShapeHandle,
}

pub struct GameSession<P> {
    physics: P,
    tuning: ArenaTuning,
    arena: ArenaShapes,

    players: HashMap<PlayerId, Player>,
    // Outbound queues for the players above; always keyed by the same ids.
    links: HashMap<PlayerId, mpsc::Sender<OutboundEvent>>,
    score: Score,

    // Side tables used to interpret contacts reported by the physics world.
    shape_categories: HashMap<ShapeHandle, ShapeCategory>,
    body_owners: HashMap<BodyHandle, PlayerId>,
}

impl<P: PhysicsWorld> GameSession<P> {
    /// Builds the arena in `physics` and returns an empty session around it.
    pub fn new(mut physics: P, tuning: ArenaTuning) -> Self {
        let mut shape_categories = HashMap::new();

        let walls: Vec<ShapeHandle> = tuning
            .wall_segment_endpoints()
            .into_iter()
            .map(|(a, b)| physics.add_wall_segment(a, b, tuning.wall_thickness))
            .collect();
        for wall in &walls {
            shape_categories.insert(*wall, ShapeCategory::Wall);
        }

        let center = physics.add_center_obstacle(tuning.center_radius);
        shape_categories.insert(center, ShapeCategory::Center);

        debug!(
            walls = walls.len(),
            radius = tuning.radius,
            "arena initialized"
        );

        Self {
            physics,
            tuning,
            arena: ArenaShapes { walls, center },
            players: HashMap::new(),
            links: HashMap::new(),
            score: Score::default(),
            shape_categories,
            body_owners: HashMap::new(),
        }
    }

    pub fn tuning(&self) -> &ArenaTuning {
        &self.tuning
    }

    pub fn arena(&self) -> &ArenaShapes {
        &self.arena
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_position(&self, id: PlayerId) -> Option<Vec2> {
        let player = self.players.get(&id)?;
        self.physics.position(player.body.body)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Spawns a body for `id`, balances it onto a team and registers its outbound queue.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        outbound_tx: mpsc::Sender<OutboundEvent>,
    ) -> ConfigPayload {
        let team = teams::assign_team(self.players.values().map(|p| p.team));
        let body = self
            .physics
            .spawn_player(self.tuning.center(), self.tuning.player_radius);

        self.shape_categories.insert(body.shape, ShapeCategory::Player);
        self.body_owners.insert(body.body, id);
        self.players.insert(
            id,
            Player {
                id,
                team,
                state: PlayerState::Normal,
                body,
            },
        );
        self.links.insert(id, outbound_tx);

        info!(player_id = id, team = team.index(), "player joined");

        ConfigPayload {
            arena_radius: self.tuning.radius,
            player_radius: self.tuning.player_radius,
            assigned_id: id,
        }
    }

    /// Removes `id` and releases its physics resources. Returns false if it was absent.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.players.remove(&id) else {
            return false;
        };

        self.links.remove(&id);
        self.shape_categories.remove(&player.body.shape);
        self.body_owners.remove(&player.body.body);
        self.physics.despawn_player(player.body);

        info!(player_id = id, team = player.team.index(), "player left");
        self.rebalance_teams();
        true
    }

    // Moves the newest members of an oversized team across until sizes are within one.
    fn rebalance_teams(&mut self) {
        while let Some(from) = teams::surplus_team(self.players.values().map(|p| p.team)) {
            let Some(player) = self
                .players
                .values_mut()
                .filter(|p| p.team == from)
                .max_by_key(|p| p.id)
            else {
                break;
            };
            player.team = from.opponent();
            player.state = PlayerState::Normal;
            info!(
                player_id = player.id,
                team = player.team.index(),
                "player moved to balance teams"
            );
        }
    }

    /// Applies a client command. Commands for unknown ids are ignored.
    pub fn apply_command(&mut self, id: PlayerId, command: &ClientCommand) -> bool {
        let Some(player) = self.players.get(&id) else {
            return false;
        };

        match command {
            ClientCommand::Player { target } => {
                if !target.is_finite() {
                    return false;
                }
                self.physics.set_drag_target(player.body.body, *target);
                true
            }
        }
    }

    /// Advances physics by `dt` and runs collision inspection for every player.
    pub fn step(&mut self, dt: f32) -> TickReport {
        self.physics.step(dt);

        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort_unstable();

        let mut report = TickReport::default();
        for id in ids {
            if self.inspect_contacts(id) {
                report.deaths.push(id);
            }
        }

        if self.score.reset_if_exceeds(self.tuning.score_limit) {
            self.reset_players();
            report.score_reset = true;
            info!(players = self.players.len(), "score limit reached; match reset");
        }

        report
    }

    // Feeds this tick's first contacts for `id` through the state machine.
    // Returns true if the player died.
    fn inspect_contacts(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.players.get(&id) else {
            return false;
        };
        let (team, body) = (player.team, player.body.body);
        let mut state = player.state;

        let contacts = self.physics.contacts(body);
        let mut died = false;

        for contact in contacts.iter().filter(|c| c.first) {
            let Some(&category) = self.shape_categories.get(&contact.other_shape) else {
                continue;
            };
            let other_team = contact
                .other_body
                .and_then(|other| self.body_owners.get(&other))
                .and_then(|owner| self.players.get(owner))
                .map(|other| other.team);

            let Some(event) = ContactEvent::classify(team, category, other_team) else {
                continue;
            };
            let Some(next) = collision::next_state(state, event) else {
                continue;
            };

            debug!(player_id = id, from = ?state, to = ?next, ?event, "player state changed");

            if next == PlayerState::Dead {
                let scorer = self.score.record_death(team);
                self.physics.set_position(body, self.tuning.center());
                state = PlayerState::Normal;
                died = true;
                info!(
                    player_id = id,
                    team = team.index(),
                    scorer = scorer.index(),
                    score = ?self.score.0,
                    "player died"
                );
                // Remaining contacts describe the body before it was moved.
                break;
            }
            state = next;
        }

        if let Some(player) = self.players.get_mut(&id) {
            player.state = state;
        }
        died
    }

    fn reset_players(&mut self) {
        let center = self.tuning.center();
        for player in self.players.values_mut() {
            self.physics.set_position(player.body.body, center);
            player.state = PlayerState::Normal;
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let players = self
            .players
            .values()
            .map(|p| {
                let pos = self
                    .physics
                    .position(p.body.body)
                    .unwrap_or(self.tuning.center());
                (
                    p.id,
                    PlayerSnapshot {
                        pos,
                        team: p.team,
                        state: p.state,
                    },
                )
            })
            .collect();

        Snapshot {
            players,
            score: self.score,
        }
    }

    /// Outbound queues of every registered player.
    pub fn recipients(&self) -> Vec<(PlayerId, mpsc::Sender<OutboundEvent>)> {
        self.links
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }
}

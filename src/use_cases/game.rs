// Session coordinator: owns the shared game session and drives both tick contexts.

use super::session::GameSession;
use super::throttle::LogThrottle;
use super::types::{
    ConfigPayload, ControlEvent, InboundMessage, OutboundEvent, PendingClient, TickReport,
};
use crate::domain::tuning::arena::ArenaTuning;
use crate::domain::{PhysicsWorld, PlayerId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, MutexGuard, mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Timing knobs for the session coordinator.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Fixed physics step and simulation tick interval.
    pub sim_interval: Duration,
    /// Interval between state snapshots sent to clients.
    pub broadcast_interval: Duration,
    /// Upper bound on the wait for a broker `Establish` during connect.
    pub handshake_timeout: Duration,
}

/// Why a connect handshake did not produce a player.
#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeError {
    /// The broker dropped its side before receiving the id.
    RegisterDropped,
    /// The broker dropped its side before acknowledging.
    EstablishDropped,
    EstablishTimeout,
}

pub struct SessionManager<P> {
    session: Mutex<GameSession<P>>,
    next_id: AtomicU64,
    settings: SessionSettings,
}

impl<P: PhysicsWorld> SessionManager<P> {
    pub fn new(physics: P, tuning: ArenaTuning, settings: SessionSettings) -> Self {
        Self {
            session: Mutex::new(GameSession::new(physics, tuning)),
            next_id: AtomicU64::new(1),
            settings,
        }
    }

    /// Exclusive access to the session, e.g. for inspection.
    pub async fn lock(&self) -> MutexGuard<'_, GameSession<P>> {
        self.session.lock().await
    }

    /// Runs the two-phase connect handshake and spawns the player on success.
    ///
    /// Nothing is allocated in the physics world until the broker has acknowledged the
    /// registration, so abandoned handshakes leave no bodies behind.
    pub async fn connect(&self, client: PendingClient) -> Result<ConfigPayload, HandshakeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if client.register_tx.send(id).is_err() {
            return Err(HandshakeError::RegisterDropped);
        }

        let link = match timeout(self.settings.handshake_timeout, client.establish_rx).await {
            Ok(Ok(link)) => link,
            Ok(Err(_)) => return Err(HandshakeError::EstablishDropped),
            Err(_) => return Err(HandshakeError::EstablishTimeout),
        };

        let config = self
            .session
            .lock()
            .await
            .add_player(id, link.outbound_tx.clone());

        // Config goes out before the first snapshot can be queued for this player.
        if let Err(err) = link
            .outbound_tx
            .try_send(OutboundEvent::Config(config.clone()))
        {
            warn!(player_id = id, error = %err, "failed to queue config message");
        }

        Ok(config)
    }

    /// Removes the player for `client_id`, if any. Safe to call repeatedly.
    pub async fn close(&self, client_id: PlayerId) -> bool {
        self.session.lock().await.remove_player(client_id)
    }

    /// Applies an inbound command; messages from unknown ids are dropped.
    pub async fn handle_client_message(&self, message: InboundMessage) -> bool {
        // Presence is re-checked under the lock; a racing close makes this a no-op.
        self.session
            .lock()
            .await
            .apply_command(message.from, &message.command)
    }

    /// Steps physics and inspects collisions inside a single lock window.
    pub async fn simulate_tick(&self) -> TickReport {
        let dt = self.settings.sim_interval.as_secs_f32();
        self.session.lock().await.step(dt)
    }

    /// Sends one snapshot to every connected player and returns how many were queued.
    ///
    /// Players whose outbound queue is closed are treated as abandoned and removed.
    pub async fn broadcast(&self, throttle: &mut LogThrottle) -> usize {
        let (snapshot, recipients) = {
            let session = self.session.lock().await;
            (Arc::new(session.snapshot()), session.recipients())
        };

        let mut sent = 0;
        let mut abandoned = Vec::new();
        for (player_id, outbound_tx) in recipients {
            match outbound_tx.try_send(OutboundEvent::State(snapshot.clone())) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(_)) => {
                    if throttle.should_log() {
                        warn!(player_id, "outbound queue full; dropping snapshot");
                    }
                }
                Err(TrySendError::Closed(_)) => abandoned.push(player_id),
            }
        }

        for player_id in abandoned {
            if self.close(player_id).await {
                info!(player_id, "connection abandoned; player removed");
            }
        }

        sent
    }
}

/// Simulation context: fixed-rate physics step plus collision inspection.
///
/// Exits once `shutdown` flips or its sender is dropped; a signal sent mid-tick is
/// seen on the next loop.
pub async fn simulation_task<P: PhysicsWorld>(
    manager: Arc<SessionManager<P>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(manager.settings.sim_interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("simulation task shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        let report = manager.simulate_tick().await;
        if !report.deaths.is_empty() {
            debug!(deaths = ?report.deaths, score_reset = report.score_reset, "tick resolved deaths");
        }
    }
}

/// Session context: control events, inbound client messages and the broadcast tick.
pub async fn session_task<P: PhysicsWorld>(
    manager: Arc<SessionManager<P>>,
    mut control_rx: mpsc::Receiver<ControlEvent>,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(manager.settings.broadcast_interval);
    let mut throttle = LogThrottle::default();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("session task shutting down");
                break;
            }
            control = control_rx.recv() => {
                let Some(control) = control else {
                    warn!("control channel closed; session task exiting");
                    break;
                };
                handle_control(&manager, control).await;
            }
            Some(message) = inbound_rx.recv() => {
                let from = message.from;
                if !manager.handle_client_message(message).await {
                    debug!(player_id = from, "client message dropped");
                }
            }
            _ = interval.tick() => {
                manager.broadcast(&mut throttle).await;
            }
        }
    }
}

async fn handle_control<P: PhysicsWorld>(manager: &SessionManager<P>, control: ControlEvent) {
    match control {
        ControlEvent::Connect(client) => match manager.connect(client).await {
            Ok(config) => {
                debug!(player_id = config.assigned_id, "connect handshake complete");
            }
            Err(HandshakeError::EstablishTimeout) => {
                warn!("connect handshake timed out; connection abandoned");
            }
            Err(e) => {
                info!(error = ?e, "connect handshake abandoned");
            }
        },
        ControlEvent::Close { client_id } => {
            if !manager.close(client_id).await {
                debug!(player_id = client_id, "close for unknown client ignored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlayerState, Vec2};
    use crate::use_cases::test_support::ScriptedPhysics;
    use crate::use_cases::types::{ClientCommand, ClientLink, handshake};

    fn settings() -> SessionSettings {
        SessionSettings {
            sim_interval: Duration::from_millis(10),
            broadcast_interval: Duration::from_millis(40),
            handshake_timeout: Duration::from_millis(200),
        }
    }

    fn manager() -> (Arc<SessionManager<ScriptedPhysics>>, ScriptedPhysics) {
        let physics = ScriptedPhysics::default();
        let manager = SessionManager::new(physics.clone(), ArenaTuning::default(), settings());
        (Arc::new(manager), physics)
    }

    // Plays the broker side of a successful handshake.
    async fn connect(
        manager: &SessionManager<ScriptedPhysics>,
    ) -> (ConfigPayload, mpsc::Receiver<OutboundEvent>) {
        let (pending, broker) = handshake();
        let (outbound_tx, outbound_rx) = mpsc::channel(16);
        let broker_side = async move {
            let id = broker.register_rx.await.expect("register");
            broker
                .establish_tx
                .send(ClientLink { outbound_tx })
                .expect("establish");
            id
        };
        let (config, id) = tokio::join!(manager.connect(pending), broker_side);
        let config = config.expect("handshake should succeed");
        assert_eq!(config.assigned_id, id);
        (config, outbound_rx)
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn connect_assigns_monotonic_ids_and_balanced_teams() {
        let (manager, _physics) = manager();
        let (a, mut a_rx) = connect(&manager).await;
        let (b, _b_rx) = connect(&manager).await;

        assert_eq!(a.assigned_id, 1);
        assert_eq!(b.assigned_id, 2);
        assert_eq!(a.arena_radius, 320.0);
        assert_eq!(a.player_radius, 16.0);

        let session = manager.lock().await;
        assert_eq!(session.player(1).expect("a").team.index(), 0);
        assert_eq!(session.player(2).expect("b").team.index(), 1);
        drop(session);

        match drain(&mut a_rx).as_slice() {
            [OutboundEvent::Config(config)] => assert_eq!(config, &a),
            other => panic!("expected a single config message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn abandoned_handshake_allocates_nothing() {
        let (manager, physics) = manager();

        // Broker vanishes before the id arrives.
        let (pending, broker) = handshake();
        drop(broker);
        assert_eq!(
            manager.connect(pending).await,
            Err(HandshakeError::RegisterDropped)
        );

        // Broker takes the id but never acknowledges.
        let (pending, broker) = handshake();
        let broker_side = async move {
            let _ = broker.register_rx.await;
            drop(broker.establish_tx);
        };
        let (result, ()) = tokio::join!(manager.connect(pending), broker_side);
        assert_eq!(result, Err(HandshakeError::EstablishDropped));

        assert!(physics.spawned().is_empty());
        assert_eq!(manager.lock().await.player_count(), 0);

        // Ids are still consumed by the failed attempts.
        let (config, _rx) = connect(&manager).await;
        assert_eq!(config.assigned_id, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_broker_times_out() {
        let (manager, physics) = manager();
        let (pending, broker) = handshake();

        let result = manager.connect(pending).await;
        assert_eq!(result, Err(HandshakeError::EstablishTimeout));
        assert!(physics.spawned().is_empty());
        drop(broker);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_the_body() {
        let (manager, physics) = manager();
        let (config, _rx) = connect(&manager).await;

        assert!(manager.close(config.assigned_id).await);
        assert!(!manager.close(config.assigned_id).await);
        assert!(!manager.close(42).await);
        assert_eq!(physics.despawned(), physics.spawned());
    }

    #[tokio::test]
    async fn messages_after_close_are_dropped() {
        let (manager, physics) = manager();
        let (config, _rx) = connect(&manager).await;
        let id = config.assigned_id;
        let body = manager.lock().await.player(id).expect("player").body.body;

        let message = InboundMessage {
            from: id,
            command: ClientCommand::Player {
                target: Vec2::new(3.0, 4.0),
            },
        };
        assert!(manager.handle_client_message(message.clone()).await);
        assert_eq!(physics.drag_target(body), Some(Vec2::new(3.0, 4.0)));

        manager.close(id).await;
        assert!(!manager.handle_client_message(message).await);
    }

    #[tokio::test]
    async fn broadcast_reaches_exactly_the_connected_players() {
        let (manager, _physics) = manager();
        let (a, mut a_rx) = connect(&manager).await;
        let (b, mut b_rx) = connect(&manager).await;
        let (c, mut c_rx) = connect(&manager).await;
        manager.close(b.assigned_id).await;
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        let mut throttle = LogThrottle::default();
        assert_eq!(manager.broadcast(&mut throttle).await, 2);

        for rx in [&mut a_rx, &mut c_rx] {
            match drain(rx).as_slice() {
                [OutboundEvent::State(snapshot)] => {
                    let ids: Vec<_> = snapshot.players.keys().copied().collect();
                    assert_eq!(ids, vec![a.assigned_id, c.assigned_id]);
                }
                other => panic!("expected one snapshot, got {other:?}"),
            }
        }
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn broadcast_removes_players_with_closed_queues() {
        let (manager, physics) = manager();
        let (_a, a_rx) = connect(&manager).await;
        let (_b, _b_rx) = connect(&manager).await;
        drop(a_rx);

        let mut throttle = LogThrottle::default();
        assert_eq!(manager.broadcast(&mut throttle).await, 1);
        assert_eq!(manager.lock().await.player_count(), 1);
        assert_eq!(physics.despawned().len(), 1);
    }

    #[tokio::test]
    async fn simulate_tick_steps_physics_once_under_the_lock() {
        let (manager, physics) = manager();
        let (config, _rx) = connect(&manager).await;
        let id = config.assigned_id;

        let (body, wall) = {
            let session = manager.lock().await;
            (
                session.player(id).expect("player").body.body,
                session.arena().walls[10],
            )
        };
        physics.touch(body, wall, None);

        let report = manager.simulate_tick().await;
        assert!(report.deaths.is_empty());
        assert_eq!(physics.steps(), 1);
        assert_eq!(
            manager.lock().await.player(id).expect("player").state,
            PlayerState::Risk
        );
    }

    #[tokio::test(start_paused = true)]
    async fn session_task_runs_handshake_messages_and_broadcast() {
        let (manager, physics) = manager();
        let (control_tx, control_rx) = mpsc::channel(8);
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(session_task(
            manager.clone(),
            control_rx,
            inbound_rx,
            shutdown_rx,
        ));

        let (pending, broker) = handshake();
        control_tx
            .send(ControlEvent::Connect(pending))
            .await
            .expect("control open");
        let id = broker.register_rx.await.expect("register");
        let (outbound_tx, mut outbound_rx) = mpsc::channel(16);
        broker
            .establish_tx
            .send(ClientLink { outbound_tx })
            .expect("establish");

        match outbound_rx.recv().await {
            Some(OutboundEvent::Config(config)) => assert_eq!(config.assigned_id, id),
            other => panic!("expected config, got {other:?}"),
        }

        // The player exists once its config is queued.
        let body = manager.lock().await.player(id).expect("player").body.body;
        let target = Vec2::new(-5.0, 8.0);
        inbound_tx
            .send(InboundMessage {
                from: id,
                command: ClientCommand::Player { target },
            })
            .await
            .expect("inbound open");

        // Inbound and broadcast branches race; wait for the command itself.
        for _ in 0..100 {
            if physics.drag_target(body) == Some(target) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(physics.drag_target(body), Some(target));

        // A broadcast tick delivers a snapshot containing the new player.
        loop {
            match outbound_rx.recv().await {
                Some(OutboundEvent::State(snapshot)) => {
                    assert!(snapshot.players.contains_key(&id));
                    break;
                }
                Some(OutboundEvent::Config(_)) => panic!("config sent twice"),
                None => panic!("outbound closed"),
            }
        }

        control_tx
            .send(ControlEvent::Close { client_id: id })
            .await
            .expect("control open");
        // Closing the control channel ends the task once the close is processed.
        drop(control_tx);
        task.await.expect("session task");
        assert_eq!(manager.lock().await.player_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_sent_mid_tick_still_stops_the_simulation() {
        let (manager, physics) = manager();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Holding the lock parks the task inside its first tick, away from the signal.
        let guard = manager.lock().await;
        let task = tokio::spawn(simulation_task(manager.clone(), shutdown_rx));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        shutdown_tx.send(true).expect("task still listening");
        drop(guard);

        timeout(Duration::from_secs(1), task)
            .await
            .expect("simulation task should exit")
            .expect("simulation task panicked");
        assert!(physics.steps() >= 1);
    }

    #[tokio::test]
    async fn dropped_shutdown_sender_stops_the_session_task() {
        let (manager, _physics) = manager();
        let (_control_tx, control_rx) = mpsc::channel(8);
        let (_inbound_tx, inbound_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(session_task(manager, control_rx, inbound_rx, shutdown_rx));

        drop(shutdown_tx);
        timeout(Duration::from_secs(1), task)
            .await
            .expect("session task should exit")
            .expect("session task panicked");
    }
}

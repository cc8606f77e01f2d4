// Use-case level inputs/outputs exchanged with the transport broker.

use crate::domain::{PlayerId, Snapshot, Vec2};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Control-plane traffic from the broker into the session task.
#[derive(Debug)]
pub enum ControlEvent {
    Connect(PendingClient),
    Close { client_id: PlayerId },
}

/// Broker side of a connect handshake that has not completed yet.
///
/// The session replies with `Register` (the allocated id) and then waits for the broker's
/// `Establish`, which hands over the connection's outbound queue.
#[derive(Debug)]
pub struct PendingClient {
    pub register_tx: oneshot::Sender<PlayerId>,
    pub establish_rx: oneshot::Receiver<ClientLink>,
}

/// Broker half kept by the connection while the handshake runs.
#[derive(Debug)]
pub struct BrokerHandshake {
    pub register_rx: oneshot::Receiver<PlayerId>,
    pub establish_tx: oneshot::Sender<ClientLink>,
}

/// Creates both halves of a connect handshake.
pub fn handshake() -> (PendingClient, BrokerHandshake) {
    let (register_tx, register_rx) = oneshot::channel();
    let (establish_tx, establish_rx) = oneshot::channel();
    (
        PendingClient {
            register_tx,
            establish_rx,
        },
        BrokerHandshake {
            register_rx,
            establish_tx,
        },
    )
}

/// Acknowledgment sent by the broker once a registered client is reachable.
#[derive(Debug, Clone)]
pub struct ClientLink {
    pub outbound_tx: mpsc::Sender<OutboundEvent>,
}

/// Parsed client command routed to the session task.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    // New cursor position the player's body should be dragged toward.
    Player { target: Vec2 },
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub from: PlayerId,
    pub command: ClientCommand,
}

/// One-time arena description sent to a freshly connected player.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigPayload {
    pub arena_radius: f32,
    pub player_radius: f32,
    pub assigned_id: PlayerId,
}

/// Messages queued for a single connected player.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    Config(ConfigPayload),
    // Shared across every recipient of the same broadcast tick.
    State(Arc<Snapshot>),
}

/// Summary of one simulation step, used for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub deaths: Vec<PlayerId>,
    pub score_reset: bool,
}

use crate::use_cases::{ControlEvent, InboundMessage};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    // Connect/close handshakes flowing into the session task.
    pub control_tx: mpsc::Sender<ControlEvent>,
    // Parsed client commands flowing into the session task.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    // How long a connection waits for its player id.
    pub register_timeout: Duration,
    // Per-connection queue for config and state messages.
    pub outbound_capacity: usize,
}

use crate::domain::PlayerId;
use crate::interface_adapters::protocol::{ServerMessage, parse_client_message};
use crate::interface_adapters::state::AppState;
use crate::use_cases::types::{ClientLink, ClientCommand, handshake};
use crate::use_cases::{ControlEvent, InboundMessage, LogThrottle, OutboundEvent};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    ControlClosed,
    InboundClosed,
    RegisterDropped,
    RegisterTimeout,
    EstablishDropped,
}

// Connection ids only correlate log lines; player ids come from the session.
fn next_conn_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let span = info_span!(
            "conn",
            conn_id = next_conn_id(),
            player_id = tracing::field::Empty
        );
        handle_socket(socket, state).instrument(span)
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (player_id, outbound_rx) = match register_connection(&state).await {
        Ok(registered) => registered,
        Err(e) => {
            error!(error = ?e, "failed to register connection");
            let _ = send_close_with_reason(&mut socket, close_code::ERROR, "session unavailable")
                .await;
            return;
        }
    };

    Span::current().record("player_id", player_id);
    info!(player_id, "client connected");

    let mut ctx = ConnCtx::new(player_id, state.inbound_tx.clone(), outbound_rx);

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }

    // The session drops the player no matter how the loop ended.
    if state
        .control_tx
        .send(ControlEvent::Close {
            client_id: player_id,
        })
        .await
        .is_err()
    {
        warn!(player_id, "control channel closed; close notification lost");
    }

    debug!(
        player_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_messages = ctx.invalid_messages,
        "connection stats"
    );
    info!(player_id, "client disconnected");
}

// Connect handshake, broker side: ask for an id, then hand over the outbound queue.
async fn register_connection(
    state: &AppState,
) -> Result<(PlayerId, mpsc::Receiver<OutboundEvent>), NetError> {
    let (pending, broker) = handshake();
    state
        .control_tx
        .send(ControlEvent::Connect(pending))
        .await
        .map_err(|_| NetError::ControlClosed)?;

    let player_id = match timeout(state.register_timeout, broker.register_rx).await {
        Ok(Ok(player_id)) => player_id,
        Ok(Err(_)) => return Err(NetError::RegisterDropped),
        Err(_) => return Err(NetError::RegisterTimeout),
    };

    let (outbound_tx, outbound_rx) = mpsc::channel(state.outbound_capacity);
    broker
        .establish_tx
        .send(ClientLink { outbound_tx })
        .map_err(|_| NetError::EstablishDropped)?;

    Ok((player_id, outbound_rx))
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    // TODO: serialize each state snapshot once per broadcast tick instead of once per connection.
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

struct ConnCtx {
    player_id: PlayerId,
    inbound_tx: mpsc::Sender<InboundMessage>,
    outbound_rx: mpsc::Receiver<OutboundEvent>,

    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,

    invalid_messages: u64,

    inbound_full_log: LogThrottle,
    invalid_log: LogThrottle,
}

impl ConnCtx {
    fn new(
        player_id: PlayerId,
        inbound_tx: mpsc::Sender<InboundMessage>,
        outbound_rx: mpsc::Receiver<OutboundEvent>,
    ) -> Self {
        Self {
            player_id,
            inbound_tx,
            outbound_rx,
            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            invalid_messages: 0,
            inbound_full_log: LogThrottle::default(),
            invalid_log: LogThrottle::default(),
        }
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, ctx) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing config/state queued by the session
            outbound = ctx.outbound_rx.recv() => {
                match outbound {
                    Some(event) => match forward_outbound(&event, socket, ctx).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    None => {
                        // The session already removed this player.
                        info!(player_id = ctx.player_id, "session released connection");
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let player_id = ctx.player_id;
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match parse_client_message(text.as_str()) {
                    Ok(command) => forward_command(ctx, command),
                    Err(parse_err) => {
                        // Dropped without a reply; the player keeps its current target.
                        ctx.invalid_messages += 1;
                        if ctx.invalid_log.should_log() {
                            warn!(
                                player_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }
                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(bytes) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += bytes.len() as u64;
                ctx.invalid_messages += 1;
                if ctx.invalid_log.should_log() {
                    warn!(player_id, "binary messages not supported; dropping");
                }
                Ok(LoopControl::Continue)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(player_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(player_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

fn forward_command(ctx: &mut ConnCtx, command: ClientCommand) -> Result<LoopControl, NetError> {
    let player_id = ctx.player_id;
    match ctx.inbound_tx.try_send(InboundMessage {
        from: player_id,
        command,
    }) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(TrySendError::Full(_)) => {
            if ctx.inbound_full_log.should_log() {
                warn!(player_id, "inbound channel full; dropping message");
            }
            Ok(LoopControl::Continue)
        }
        Err(TrySendError::Closed(_)) => Err(NetError::InboundClosed),
    }
}

async fn forward_outbound(
    event: &OutboundEvent,
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> LoopControl {
    let msg = ServerMessage::from(event);
    match send_message(socket, &msg).await {
        Ok(bytes) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(player_id = ctx.player_id, error = ?err, "failed to send server message");
            LoopControl::Disconnect
        }
    }
}

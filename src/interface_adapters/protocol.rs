// Wire protocol DTOs and conversions for public arena messages.
// Every frame is a JSON envelope: {"type": "<name>", "data": {...}}.

use crate::domain::{PlayerId, PlayerSnapshot, PlayerState, Snapshot, Vec2};
use crate::use_cases::types::{ClientCommand, ConfigPayload, OutboundEvent};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    // Arena description, sent once right after the handshake.
    Config(ConfigDto),
    // Periodic snapshot of every player plus the score.
    State(StateDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ClientMessage {
    // Cursor position the player's body should follow.
    Player(PlayerMessageDto),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDto {
    pub arena_radius: f32,
    pub player_radius: f32,
    pub assigned_id: PlayerId,
}

impl From<&ConfigPayload> for ConfigDto {
    fn from(config: &ConfigPayload) -> Self {
        Self {
            arena_radius: config.arena_radius,
            player_radius: config.player_radius,
            assigned_id: config.assigned_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PosDto<T> {
    pub x: T,
    pub y: T,
}

/// Player state names as clients see them.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStateDto {
    Normal,
    Risk,
    Dire,
    Dead,
}

impl From<PlayerState> for PlayerStateDto {
    fn from(state: PlayerState) -> Self {
        match state {
            PlayerState::Normal => PlayerStateDto::Normal,
            PlayerState::Risk => PlayerStateDto::Risk,
            PlayerState::Dire => PlayerStateDto::Dire,
            PlayerState::Dead => PlayerStateDto::Dead,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDto {
    pub pos: PosDto<f32>,
    pub team: u8,
    pub state: PlayerStateDto,
}

impl From<&PlayerSnapshot> for PlayerDto {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            pos: PosDto {
                x: player.pos.x,
                y: player.pos.y,
            },
            team: player.team.index() as u8,
            state: player.state.into(),
        }
    }
}

/// Snapshot payload; player ids become the object keys.
#[derive(Debug, Clone, Serialize)]
pub struct StateDto {
    pub players: BTreeMap<PlayerId, PlayerDto>,
    pub score: [u32; 2],
}

impl From<&Snapshot> for StateDto {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            players: snapshot
                .players
                .iter()
                .map(|(id, player)| (*id, PlayerDto::from(player)))
                .collect(),
            score: snapshot.score.0,
        }
    }
}

impl From<&OutboundEvent> for ServerMessage {
    fn from(event: &OutboundEvent) -> Self {
        match event {
            OutboundEvent::Config(config) => ServerMessage::Config(config.into()),
            OutboundEvent::State(snapshot) => ServerMessage::State(StateDto::from(&**snapshot)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerMessageDto {
    pub pos: TargetDto,
}

/// Inbound cursor position. Only a JSON object with numeric `x` and `y` is accepted.
#[derive(Debug, Clone, Copy)]
pub struct TargetDto {
    pub x: f64,
    pub y: f64,
}

impl<'de> Deserialize<'de> for TargetDto {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TargetVisitor;

        impl<'de> Visitor<'de> for TargetVisitor {
            type Value = TargetDto;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with numeric x and y")
            }

            // No visit_seq: `[x, y]` arrays are rejected.
            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TargetDto, A::Error> {
                let (mut x, mut y) = (None, None);
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "x" => x = Some(map.next_value::<f64>()?),
                        "y" => y = Some(map.next_value::<f64>()?),
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(TargetDto {
                    x: x.ok_or_else(|| de::Error::missing_field("x"))?,
                    y: y.ok_or_else(|| de::Error::missing_field("y"))?,
                })
            }
        }

        deserializer.deserialize_map(TargetVisitor)
    }
}

/// Why an inbound frame was rejected.
#[derive(Debug)]
pub enum ProtocolError {
    Json(serde_json::Error),
    NonFinite,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "invalid message: {e}"),
            ProtocolError::NonFinite => f.write_str("position is not finite"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Parses one text frame into a session command.
pub fn parse_client_message(text: &str) -> Result<ClientCommand, ProtocolError> {
    let message = serde_json::from_str::<ClientMessage>(text).map_err(ProtocolError::Json)?;
    match message {
        ClientMessage::Player(data) => {
            let target = Vec2::new(data.pos.x as f32, data.pos.y as f32);
            if !target.is_finite() {
                return Err(ProtocolError::NonFinite);
            }
            Ok(ClientCommand::Player { target })
        }
    }
}

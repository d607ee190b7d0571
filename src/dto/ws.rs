use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::dto::game::{CardView, PlayerView};

/// Messages accepted from game clients. Every frame is a JSON envelope
/// `{"type": ..., "payload": {...}}`; anything that fails to parse is
/// dropped by the connection handler.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        player_name: String,
        player_id: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        player_name: String,
        player_id: String,
    },
    ToggleReady {},
    StartGame {},
    RestartGame {},
    ClientReady {},
    #[serde(rename_all = "camelCase")]
    Buzz { card_id: String },
    NoSong {},
    Chat { text: String },
    Ping {},
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse an inbound text frame.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Messages emitted to game clients, mirrored by the front-end renderer.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_id: String },
    #[serde(rename_all = "camelCase")]
    RoomStateUpdate {
        players: Vec<PlayerView>,
        owner_id: String,
    },
    ChatReceive { sender: String, text: String },
    GameStarted { cards: Vec<CardView>, round: u32 },
    #[serde(rename_all = "camelCase")]
    PrepareRound {
        round: u32,
        start_time: u32,
        play_duration: u32,
    },
    CountdownStart {},
    PlayRound {},
    WrongAnswer {},
    #[serde(rename_all = "camelCase")]
    RoundEnd {
        reason: String,
        correct_song: String,
        cards: Vec<CardView>,
        show_answer: bool,
    },
    GameOver { players: Vec<PlayerView> },
    GameReset {},
    Error { message: String },
}

impl ServerMessage {
    /// Serialize into a text frame ready for an outbound sink.
    ///
    /// Serialization failure is a bug in this crate, not a client condition;
    /// it is logged and the frame is skipped.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::Text(text.into())),
            Err(err) => {
                warn!(error = %err, "failed to serialize outbound frame `{self:?}`");
                None
            }
        }
    }
}

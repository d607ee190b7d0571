use serde::Serialize;
use utoipa::ToSchema;

use crate::state::room::{Card, Player};

/// Snapshot of a player as sent inside `room_state_update` and `game_over`.
///
/// `is_ready` is deliberately absent: the buffering handshake is internal to
/// the prepare phase and never rendered.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub score: i32,
    pub has_answered: bool,
    pub game_ready: bool,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            score: player.score,
            has_answered: player.has_answered,
            game_ready: player.game_ready,
        }
    }
}

/// Snapshot of a board card. The wire form is camelCase while the catalogue
/// on disk stays snake_case.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: String,
    pub title_original: String,
    pub title_translation: String,
    pub is_matched: bool,
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.clone(),
            title_original: card.title_original.clone(),
            title_translation: card.title_translation.clone(),
            is_matched: card.is_matched,
        }
    }
}

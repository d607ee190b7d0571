//! Per-room state: players, board, phases, and the armed timer handle.
//!
//! Every field of [`RoomInner`] is guarded by the room mutex; helpers that
//! take `&self`/`&mut self` therefore run inside a critical section. Nothing
//! in here awaits.

use axum::extract::ws::Message;
use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use tokio::sync::{Mutex, MutexGuard, mpsc, oneshot};

use crate::{
    catalog::Song,
    dto::{
        game::{CardView, PlayerView},
        ws::ServerMessage,
    },
};

/// Hard cap on room membership.
pub const MAX_PLAYERS: usize = 4;
/// Songs sampled from the catalogue for one game.
pub const SONG_POOL_SIZE: usize = 25;
/// Cards dealt onto the board from the front of the pool.
pub const BOARD_SIZE: usize = 16;

/// A connected player inside a room. `conn` feeds the per-client writer
/// task, so pushing frames here never blocks.
#[derive(Debug)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub score: i32,
    /// Whether the player has spent their one answer this round.
    pub has_answered: bool,
    /// Lobby-ready toggle, meaningful while the room is waiting.
    pub game_ready: bool,
    /// Per-round buffering acknowledgement.
    pub is_ready: bool,
    pub conn: mpsc::UnboundedSender<Message>,
}

impl Player {
    pub fn new(id: String, name: String, conn: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            name,
            score: 0,
            has_answered: false,
            game_ready: false,
            is_ready: false,
            conn,
        }
    }
}

/// One of the sixteen title cards on the shared board.
#[derive(Debug, Clone)]
pub struct Card {
    pub id: String,
    pub title_original: String,
    pub title_translation: String,
    pub is_matched: bool,
}

impl Card {
    fn from_song(song: &Song) -> Self {
        Self {
            id: song.id.clone(),
            title_original: song.title_original.clone(),
            title_translation: song.title_translation.clone(),
            is_matched: false,
        }
    }
}

/// Lobby-level room state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    Playing,
}

/// Round phase inside a running game. `Idle` is the pre-game value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Preparing,
    Countdown,
    Playing,
    Ended,
}

/// Values captured when a timer is armed and re-verified when it fires.
pub type Generation = (RoundState, u32);

/// A game room. All mutable state lives behind one mutex.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    inner: Mutex<RoomInner>,
}

impl Room {
    /// Build a room with its creator as sole player and owner.
    pub fn new(id: String, first_player: Player) -> Self {
        let owner_id = first_player.id.clone();
        let mut players = IndexMap::new();
        players.insert(first_player.id.clone(), first_player);

        Self {
            id,
            inner: Mutex::new(RoomInner {
                owner_id,
                players,
                state: RoomState::Waiting,
                round_state: RoundState::Idle,
                game_over: false,
                current_round: 0,
                song_pool: Vec::new(),
                board_cards: Vec::new(),
                current_song: None,
                current_song_index: 0,
                timer_cancel: None,
            }),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, RoomInner> {
        self.inner.lock().await
    }
}

/// Mutable room state, only reachable through [`Room::lock`].
#[derive(Debug)]
pub struct RoomInner {
    pub owner_id: String,
    /// Players keyed by id, in arrival order. Ownership transfers to the
    /// earliest remaining arrival when the owner leaves.
    pub players: IndexMap<String, Player>,
    pub state: RoomState,
    pub round_state: RoundState,
    /// Terminal flag: the final scoreboard has been shown and only
    /// `restart_game` moves the room forward.
    pub game_over: bool,
    pub current_round: u32,
    /// Sampled subset of the catalogue; superset of the board. Never sent to
    /// clients.
    pub song_pool: Vec<Song>,
    pub board_cards: Vec<Card>,
    /// Copy of the pool entry picked for the current round.
    pub current_song: Option<Song>,
    pub current_song_index: usize,
    timer_cancel: Option<oneshot::Sender<()>>,
}

impl RoomInner {
    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    pub fn name_taken(&self, name: &str) -> bool {
        self.players.values().any(|p| p.name == name)
    }

    pub fn all_answered(&self) -> bool {
        self.players.values().all(|p| p.has_answered)
    }

    pub fn all_ready(&self) -> bool {
        self.players.values().all(|p| p.is_ready)
    }

    /// Whether the current song still has an un-matched card on the board.
    pub fn song_on_board(&self) -> bool {
        let Some(song) = &self.current_song else {
            return false;
        };
        self.board_cards
            .iter()
            .any(|c| c.id == song.id && !c.is_matched)
    }

    /// Whether every dealt card has been matched.
    pub fn board_cleared(&self) -> bool {
        !self.board_cards.is_empty() && self.board_cards.iter().all(|c| c.is_matched)
    }

    /// Whether the audio gate may serve the current song.
    pub fn round_active(&self) -> bool {
        matches!(
            self.round_state,
            RoundState::Preparing | RoundState::Countdown | RoundState::Playing
        )
    }

    pub fn generation(&self) -> Generation {
        (self.round_state, self.current_round)
    }

    /// Clear the per-round player flags at the start of a prepare phase.
    pub fn reset_round_flags(&mut self) {
        for player in self.players.values_mut() {
            player.has_answered = false;
            player.is_ready = false;
        }
    }

    pub fn mark_card_matched(&mut self, card_id: &str) {
        if let Some(card) = self.board_cards.iter_mut().find(|c| c.id == card_id) {
            card.is_matched = true;
        }
    }

    /// Drop the current song from the pool so it cannot be drawn again.
    pub fn remove_current_song(&mut self) {
        let idx = self.current_song_index;
        if idx < self.song_pool.len() {
            self.song_pool.remove(idx);
        }
    }

    /// Deal a fresh game: sample the pool from the catalogue, cut the board
    /// from the front of the pool, then shuffle the board again so its order
    /// carries no information about the pool.
    pub fn deal_board<R: Rng + ?Sized>(&mut self, catalog: &[Song], rng: &mut R) {
        let mut pool: Vec<Song> = catalog.to_vec();
        pool.shuffle(rng);
        pool.truncate(SONG_POOL_SIZE);

        let mut cards: Vec<Card> = pool.iter().take(BOARD_SIZE).map(Card::from_song).collect();
        cards.shuffle(rng);

        self.song_pool = pool;
        self.board_cards = cards;
        self.current_song = None;
        self.current_song_index = 0;
        self.state = RoomState::Playing;
        self.round_state = RoundState::Idle;
        self.game_over = false;
        self.current_round = 1;
    }

    /// Return the room to the lobby after a finished game. Scores reset:
    /// a restarted game is a fresh game.
    pub fn reset_to_lobby(&mut self) {
        self.cancel_timer();
        self.state = RoomState::Waiting;
        self.round_state = RoundState::Idle;
        self.game_over = false;
        self.current_round = 0;
        self.song_pool.clear();
        self.board_cards.clear();
        self.current_song = None;
        self.current_song_index = 0;
        for player in self.players.values_mut() {
            player.score = 0;
            player.has_answered = false;
            player.game_ready = false;
            player.is_ready = false;
        }
    }

    /// Store the cancellation handle of the single in-flight timer.
    pub fn arm_timer(&mut self, cancel: oneshot::Sender<()>) {
        self.timer_cancel = Some(cancel);
    }

    /// Signal the in-flight timer task to exit. Idempotent; a no-op when
    /// nothing is armed.
    pub fn cancel_timer(&mut self) {
        // Dropping the sender completes the receiver side of the select.
        self.timer_cancel.take();
    }

    pub fn player_views(&self) -> Vec<PlayerView> {
        self.players.values().map(PlayerView::from).collect()
    }

    pub fn card_views(&self) -> Vec<CardView> {
        self.board_cards.iter().map(CardView::from).collect()
    }

    /// Fan a frame out to every member. Runs under the room mutex so the
    /// per-room frame order matches the state-transition order; the pushes
    /// are non-blocking and a closed sink means the peer is already
    /// disconnecting.
    pub fn broadcast(&self, msg: &ServerMessage) {
        if let Some(frame) = msg.to_message() {
            for player in self.players.values() {
                let _ = player.conn.send(frame.clone());
            }
        }
    }

    /// Unicast a frame to one member.
    pub fn send_to(&self, player_id: &str, msg: &ServerMessage) {
        if let Some(player) = self.players.get(player_id) {
            if let Some(frame) = msg.to_message() {
                let _ = player.conn.send(frame);
            }
        }
    }

    /// Broadcast the `room_state_update` snapshot.
    pub fn broadcast_state(&self) {
        self.broadcast(&ServerMessage::RoomStateUpdate {
            players: self.player_views(),
            owner_id: self.owner_id.clone(),
        });
    }
}

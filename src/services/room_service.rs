//! Membership, lobby, and answer handling.
//!
//! Every function here performs one brief critical section on the target
//! room's mutex. Buzz arbitration is the mutex acquisition order: the first
//! answer to win the lock with `has_answered == false` is the uncontested
//! first answer, later contenders in the same round observe the flag and
//! drop out.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    dto::{
        validation::{validate_player_id, validate_player_name},
        ws::ServerMessage,
    },
    services::round_service,
    state::{
        SharedState,
        room::{MAX_PLAYERS, Player, Room, RoomState, RoundState},
    },
};

/// Points awarded for buzzing the correct card.
const CORRECT_BUZZ_POINTS: i32 = 10;
/// Points awarded for correctly calling a ghost song.
const NO_SONG_POINTS: i32 = 5;
/// Penalty for a wrong buzz or a wrong ghost-song claim.
const WRONG_ANSWER_PENALTY: i32 = 5;

/// Connection-scoped session: which room and player this socket is bound to.
#[derive(Default)]
pub struct ClientSession {
    pub room: Option<Arc<Room>>,
    pub player_id: Option<String>,
}

fn session_room(session: &ClientSession) -> Option<(&Arc<Room>, &str)> {
    match (&session.room, &session.player_id) {
        (Some(room), Some(id)) => Some((room, id.as_str())),
        _ => None,
    }
}

fn send_to_client(tx: &mpsc::UnboundedSender<Message>, msg: &ServerMessage) {
    if let Some(frame) = msg.to_message() {
        let _ = tx.send(frame);
    }
}

fn identity_error(err: validator::ValidationError) -> ServerMessage {
    let message = err
        .message
        .map(|m| m.to_string())
        .unwrap_or_else(|| "invalid player identity".to_string());
    ServerMessage::Error { message }
}

/// Allocate a room with the sender as sole player and owner.
pub async fn create_room(
    state: &SharedState,
    session: &mut ClientSession,
    tx: &mpsc::UnboundedSender<Message>,
    player_name: String,
    player_id: String,
) {
    if session.room.is_some() {
        debug!("create_room ignored: connection already bound to a room");
        return;
    }
    if let Err(err) =
        validate_player_name(&player_name).and_then(|()| validate_player_id(&player_id))
    {
        send_to_client(tx, &identity_error(err));
        return;
    }

    let player = Player::new(player_id.clone(), player_name.clone(), tx.clone());
    let room = state.registry().create(player);
    info!(room = %room.id, player = %player_name, "room created");

    session.room = Some(room.clone());
    session.player_id = Some(player_id);

    send_to_client(
        tx,
        &ServerMessage::RoomCreated {
            room_id: room.id.clone(),
        },
    );
    room.lock().await.broadcast_state();
}

/// Join an existing room, with the rejection cases surfaced as `error`
/// frames. A joiner during a running game also receives a private board
/// snapshot.
pub async fn join_room(
    state: &SharedState,
    session: &mut ClientSession,
    tx: &mpsc::UnboundedSender<Message>,
    room_id: String,
    player_name: String,
    player_id: String,
) {
    if session.room.is_some() {
        debug!("join_room ignored: connection already bound to a room");
        return;
    }
    if let Err(err) =
        validate_player_name(&player_name).and_then(|()| validate_player_id(&player_id))
    {
        send_to_client(tx, &identity_error(err));
        return;
    }

    let Some(room) = state.registry().get(&room_id) else {
        send_to_client(
            tx,
            &ServerMessage::Error {
                message: "room not found".to_string(),
            },
        );
        return;
    };

    let mut inner = room.lock().await;
    if inner.is_full() {
        send_to_client(
            tx,
            &ServerMessage::Error {
                message: format!("room full (max {MAX_PLAYERS} players)"),
            },
        );
        return;
    }
    if inner.name_taken(&player_name) {
        send_to_client(
            tx,
            &ServerMessage::Error {
                message: "name already taken in this room".to_string(),
            },
        );
        return;
    }
    if inner.players.contains_key(&player_id) {
        debug!(room = %room.id, "join_room ignored: player id already present");
        return;
    }

    inner.players.insert(
        player_id.clone(),
        Player::new(player_id.clone(), player_name.clone(), tx.clone()),
    );
    info!(room = %room.id, player = %player_name, "player joined");
    inner.broadcast_state();

    if inner.state == RoomState::Playing {
        // Late joiner: board snapshot so the client can render the round in
        // progress. They may answer from this round onwards.
        inner.send_to(
            &player_id,
            &ServerMessage::GameStarted {
                cards: inner.card_views(),
                round: inner.current_round,
            },
        );
    }
    drop(inner);

    session.room = Some(room);
    session.player_id = Some(player_id);
}

/// Cleanup when the socket closes for any reason. Removes the player,
/// transfers ownership or destroys the room, and broadcasts the new state.
pub async fn disconnect(state: &SharedState, session: &mut ClientSession) {
    let (Some(room), Some(player_id)) = (session.room.take(), session.player_id.take()) else {
        return;
    };

    let now_empty = {
        let mut inner = room.lock().await;
        if inner.players.shift_remove(&player_id).is_none() {
            return;
        }
        info!(room = %room.id, player = %player_id, "player left");
        if inner.players.is_empty() {
            inner.round_state = RoundState::Ended;
            inner.cancel_timer();
            true
        } else {
            if inner.owner_id == player_id {
                // Earliest remaining arrival inherits the room.
                if let Some(next_owner) = inner.players.keys().next().cloned() {
                    inner.owner_id = next_owner;
                }
            }
            inner.broadcast_state();
            false
        }
    };

    if now_empty {
        state.registry().remove(&room.id);
        info!(room = %room.id, "room destroyed");
    }
}

/// Flip the lobby-ready toggle. Owners have no toggle; starting the game is
/// their signal.
pub async fn toggle_ready(session: &ClientSession) {
    let Some((room, player_id)) = session_room(session) else {
        return;
    };
    let mut inner = room.lock().await;
    if inner.state == RoomState::Waiting && inner.owner_id != player_id {
        if let Some(player) = inner.players.get_mut(player_id) {
            player.game_ready = !player.game_ready;
        }
    }
    inner.broadcast_state();
}

/// Owner starts the game once every other player is ready: deal the board,
/// announce it, and enter round 1.
pub async fn start_game(state: &SharedState, session: &ClientSession) {
    let Some((room, player_id)) = session_room(session) else {
        return;
    };
    let mut inner = room.lock().await;
    if inner.state != RoomState::Waiting || inner.owner_id != player_id {
        return;
    }
    let owner_id = inner.owner_id.clone();
    if !inner
        .players
        .values()
        .all(|p| p.id == owner_id || p.game_ready)
    {
        return;
    }

    inner.deal_board(state.catalog().songs(), &mut rand::rng());
    info!(room = %room.id, cards = inner.board_cards.len(), "game started");
    inner.broadcast(&ServerMessage::GameStarted {
        cards: inner.card_views(),
        round: inner.current_round,
    });
    drop(inner);

    round_service::start_round(room.clone()).await;
}

/// Owner returns a finished game to the lobby. Scores reset: a restarted
/// game is a fresh game.
pub async fn restart_game(session: &ClientSession) {
    let Some((room, player_id)) = session_room(session) else {
        return;
    };
    let mut inner = room.lock().await;
    if !inner.game_over || inner.owner_id != player_id {
        return;
    }
    info!(room = %room.id, "game reset");
    inner.reset_to_lobby();
    inner.broadcast(&ServerMessage::GameReset {});
    inner.broadcast_state();
}

/// Relay a chat line to the whole room.
pub async fn chat(session: &ClientSession, text: String) {
    let Some((room, player_id)) = session_room(session) else {
        return;
    };
    let inner = room.lock().await;
    let Some(sender) = inner.players.get(player_id).map(|p| p.name.clone()) else {
        return;
    };
    inner.broadcast(&ServerMessage::ChatReceive { sender, text });
}

/// A client finished buffering the clip. When the last player acknowledges,
/// the prepare timeout is cancelled and the countdown starts early.
pub async fn client_ready(session: &ClientSession) {
    let Some((room, player_id)) = session_room(session) else {
        return;
    };
    let round = {
        let mut inner = room.lock().await;
        if inner.round_state != RoundState::Preparing {
            return;
        }
        let Some(player) = inner.players.get_mut(player_id) else {
            return;
        };
        player.is_ready = true;
        if !inner.all_ready() {
            return;
        }
        inner.cancel_timer();
        inner.current_round
    };
    tokio::spawn(round_service::countdown_and_play(room.clone(), round));
}

/// Arbitrate a buzz: first correct answer ends the round, a wrong answer
/// costs points and may exhaust the room.
pub async fn buzz(session: &ClientSession, card_id: String) {
    let Some((room, player_id)) = session_room(session) else {
        return;
    };
    let mut inner = room.lock().await;
    if inner.round_state != RoundState::Playing {
        return;
    }
    let Some(player) = inner.players.get_mut(player_id) else {
        return;
    };
    if player.has_answered {
        return;
    }
    player.has_answered = true;
    let player_name = player.name.clone();

    let correct = inner
        .current_song
        .as_ref()
        .is_some_and(|song| song.id == card_id);
    if correct {
        if let Some(player) = inner.players.get_mut(player_id) {
            player.score += CORRECT_BUZZ_POINTS;
        }
        inner.mark_card_matched(&card_id);
        round_service::end_round(
            room,
            &mut inner,
            format!("{player_name} answered correctly! (+{CORRECT_BUZZ_POINTS})"),
            true,
            true,
        );
    } else {
        if let Some(player) = inner.players.get_mut(player_id) {
            player.score -= WRONG_ANSWER_PENALTY;
        }
        inner.send_to(player_id, &ServerMessage::WrongAnswer {});
        if inner.all_answered() {
            let remove_song = !inner.song_on_board();
            round_service::end_round(
                room,
                &mut inner,
                "no one answered correctly".to_string(),
                remove_song,
                false,
            );
        }
    }
}

/// Arbitrate a "no song on board" claim against the actual board contents.
pub async fn no_song(session: &ClientSession) {
    let Some((room, player_id)) = session_room(session) else {
        return;
    };
    let mut inner = room.lock().await;
    if inner.round_state != RoundState::Playing {
        return;
    }
    let Some(player) = inner.players.get_mut(player_id) else {
        return;
    };
    if player.has_answered {
        return;
    }
    player.has_answered = true;

    if inner.song_on_board() {
        if let Some(player) = inner.players.get_mut(player_id) {
            player.score -= WRONG_ANSWER_PENALTY;
        }
        inner.send_to(player_id, &ServerMessage::WrongAnswer {});
        if inner.all_answered() {
            round_service::end_round(
                room,
                &mut inner,
                "no one answered correctly (the song was on the board)".to_string(),
                false,
                false,
            );
        }
    } else {
        if let Some(player) = inner.players.get_mut(player_id) {
            player.score += NO_SONG_POINTS;
        }
        if inner.all_answered() {
            round_service::end_round(
                room,
                &mut inner,
                "ghost song! everyone called it".to_string(),
                true,
                false,
            );
        }
    }
}

//! Round scheduler: drives each round through prepare, countdown, playing,
//! and ended, arming and cancelling the timers along the way.
//!
//! Locking contract: [`start_round`] and [`countdown_and_play`] acquire the
//! room lock themselves; [`end_round`] requires the caller to hold it. The
//! countdown and inter-round sleeps always run with the lock released.
//!
//! Every timer task carries a oneshot cancellation receiver and, on firing,
//! re-acquires the lock and re-verifies the `(round_state, current_round)`
//! generation captured at arming. Cancellation alone races with a firing
//! timer; the generation check alone would leave cancelled timers running.
//! Both together make stale timers harmless.

use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::{sync::oneshot, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::ServerMessage,
    state::room::{Room, RoomInner, RoundState},
};

/// How long clients get to buffer before the countdown is forced.
pub const PREPARE_TIMEOUT: Duration = Duration::from_secs(5);
/// Fixed pause between `countdown_start` and `play_round`.
pub const COUNTDOWN_DURATION: Duration = Duration::from_secs(4);
/// Cap on a round in which nobody produces a resolving answer.
pub const ROUND_TIMEOUT: Duration = Duration::from_secs(90);
/// Scoreboard pause between rounds.
pub const INTER_ROUND_PAUSE: Duration = Duration::from_secs(3);
/// Longest clip length in seconds.
pub const MAX_PLAY_SECONDS: u32 = 90;

/// Begin a new round: reset the per-round flags, detect end-of-game, pick
/// the target song and clip window, tell clients to buffer, and arm the
/// prepare timeout.
pub async fn start_round(room: Arc<Room>) {
    let mut inner = room.lock().await;
    if inner.players.is_empty() {
        return;
    }

    inner.round_state = RoundState::Preparing;
    inner.reset_round_flags();

    if inner.board_cleared() {
        info!(room = %room.id, "board cleared, game over");
        finish_game(&mut inner);
        return;
    }

    if inner.song_pool.is_empty() {
        // The pool ran dry before the board did; nothing is left to play,
        // so the game ends on the current scoreboard.
        warn!(room = %room.id, "song pool exhausted with unmatched cards, game over");
        finish_game(&mut inner);
        return;
    }

    let mut rng = rand::rng();
    let idx = rng.random_range(0..inner.song_pool.len());
    let song = inner.song_pool[idx].clone();
    // Random offset so the clip never starts at the song's opening.
    let max_start = (song.duration * 3 / 4).max(1);
    let start_time = rng.random_range(0..max_start);
    let play_duration = (song.duration - start_time).min(MAX_PLAY_SECONDS);

    inner.current_song_index = idx;
    inner.current_song = Some(song);

    let round = inner.current_round;
    debug!(room = %room.id, round, start_time, play_duration, "prepare round");
    inner.broadcast(&ServerMessage::PrepareRound {
        round,
        start_time,
        play_duration,
    });

    arm_prepare_timer(&room, &mut inner);
}

/// Transition preparing → countdown → playing, sleeping the fixed countdown
/// outside the lock. `round` is the generation captured by the caller; the
/// transition is a no-op if the round has moved on.
pub async fn countdown_and_play(room: Arc<Room>, round: u32) {
    {
        let mut inner = room.lock().await;
        if inner.generation() != (RoundState::Preparing, round) {
            return;
        }
        inner.round_state = RoundState::Countdown;
        inner.broadcast(&ServerMessage::CountdownStart {});
    }

    sleep(COUNTDOWN_DURATION).await;

    let mut inner = room.lock().await;
    if inner.generation() != (RoundState::Countdown, round) {
        return;
    }
    inner.round_state = RoundState::Playing;
    info!(room = %room.id, round, "play round");
    inner.broadcast(&ServerMessage::PlayRound {});

    arm_round_timer(&room, &mut inner);
}

/// End the current round and schedule either the next round or the terminal
/// scoreboard after the inter-round pause.
///
/// The caller must hold the room lock; `inner` is the guarded state of
/// `room`.
pub fn end_round(
    room: &Arc<Room>,
    inner: &mut RoomInner,
    reason: String,
    remove_song: bool,
    show_answer: bool,
) {
    inner.round_state = RoundState::Ended;
    inner.cancel_timer();

    if remove_song {
        inner.remove_current_song();
        debug!(room = %room.id, remaining = inner.song_pool.len(), "song removed from pool");
    }

    let cleared = inner.board_cleared();
    let correct_song = inner
        .current_song
        .as_ref()
        .map(|s| s.title_original.clone())
        .unwrap_or_default();

    info!(room = %room.id, round = inner.current_round, %reason, "round ended");

    let cards = inner.card_views();
    inner.broadcast(&ServerMessage::RoundEnd {
        reason,
        correct_song,
        cards,
        show_answer,
    });
    inner.broadcast_state();

    let round = inner.current_round;
    let room = room.clone();
    tokio::spawn(async move {
        sleep(INTER_ROUND_PAUSE).await;
        if cleared {
            let mut inner = room.lock().await;
            if inner.generation() == (RoundState::Ended, round) && !inner.game_over {
                info!(room = %room.id, "board cleared, game over");
                finish_game(&mut inner);
            }
        } else {
            {
                let mut inner = room.lock().await;
                if inner.generation() != (RoundState::Ended, round) || inner.game_over {
                    return;
                }
                inner.current_round += 1;
            }
            start_round(room).await;
        }
    });
}

/// Emit the terminal scoreboard and freeze the room until `restart_game`.
/// The caller must hold the room lock.
fn finish_game(inner: &mut RoomInner) {
    inner.round_state = RoundState::Ended;
    inner.game_over = true;
    inner.cancel_timer();
    inner.broadcast(&ServerMessage::GameOver {
        players: inner.player_views(),
    });
}

/// Arm the 5 s prepare timeout. `client_ready` from every player cancels it
/// and forces the countdown early.
fn arm_prepare_timer(room: &Arc<Room>, inner: &mut RoomInner) {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    inner.arm_timer(cancel_tx);
    let round = inner.current_round;
    let room = room.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sleep(PREPARE_TIMEOUT) => {
                // Some client never acknowledged; countdown_and_play
                // re-checks the generation under the lock.
                countdown_and_play(room, round).await;
            }
            _ = cancel_rx => {}
        }
    });
}

/// Arm the 90 s round timeout.
fn arm_round_timer(room: &Arc<Room>, inner: &mut RoomInner) {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    inner.arm_timer(cancel_tx);
    let round = inner.current_round;
    let room = room.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sleep(ROUND_TIMEOUT) => {
                let mut inner = room.lock().await;
                if inner.generation() != (RoundState::Playing, round) {
                    return;
                }
                let remove_song = !inner.song_on_board();
                end_round(&room, &mut inner, "time up".to_string(), remove_song, false);
            }
            _ = cancel_rx => {}
        }
    });
}

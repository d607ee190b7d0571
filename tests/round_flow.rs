//! End-to-end round scenarios driven through the service layer with
//! channel-backed clients. Paused tokio time makes the 5 s / 4 s / 90 s /
//! 3 s timers deterministic.

use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::sleep;

use karuta_referee::{
    catalog::{Song, SongCatalog},
    config::AppConfig,
    services::room_service::{self, ClientSession},
    state::{
        AppState, SharedState,
        room::{Room, RoomState, RoundState},
    },
};

struct TestClient {
    session: ClientSession,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl TestClient {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: ClientSession::default(),
            tx,
            rx,
        }
    }

    /// Drain and decode every frame queued so far.
    fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            if let Message::Text(text) = msg {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        frames
    }
}

fn find<'a>(frames: &'a [Value], kind: &str) -> Option<&'a Value> {
    frames.iter().find(|f| f["type"] == kind)
}

fn count(frames: &[Value], kind: &str) -> usize {
    frames.iter().filter(|f| f["type"] == kind).count()
}

fn test_song(i: usize, duration: u32) -> Song {
    Song {
        id: format!("s{i}"),
        title_original: format!("原曲 {i}"),
        title_translation: format!("Song {i}"),
        duration,
    }
}

fn state_with_songs(n: usize) -> SharedState {
    let songs = (0..n).map(|i| test_song(i, 200)).collect();
    AppState::new(AppConfig::default(), SongCatalog::from_songs(songs))
}

async fn create_room(state: &SharedState, client: &mut TestClient, name: &str, id: &str) -> String {
    room_service::create_room(state, &mut client.session, &client.tx, name.into(), id.into())
        .await;
    let frames = client.drain();
    find(&frames, "room_created").expect("room_created reply")["payload"]["roomId"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn join(state: &SharedState, client: &mut TestClient, room_id: &str, name: &str, id: &str) {
    room_service::join_room(
        state,
        &mut client.session,
        &client.tx,
        room_id.into(),
        name.into(),
        id.into(),
    )
    .await;
}

/// P1 creates, P2 joins and readies, P1 starts. Leaves the room in the
/// prepare phase of round 1.
async fn setup_two_player_game(n_songs: usize) -> (SharedState, TestClient, TestClient, Arc<Room>) {
    let state = state_with_songs(n_songs);
    let mut p1 = TestClient::new();
    let mut p2 = TestClient::new();
    let room_id = create_room(&state, &mut p1, "P1", "p1").await;
    join(&state, &mut p2, &room_id, "P2", "p2").await;
    room_service::toggle_ready(&p2.session).await;
    room_service::start_game(&state, &p1.session).await;
    let room = p1.session.room.clone().expect("room bound to creator");
    (state, p1, p2, room)
}

/// Skip the prepare/countdown choreography: force the room straight into
/// the playing phase with no timer armed.
async fn force_playing(room: &Arc<Room>) {
    let mut inner = room.lock().await;
    assert_eq!(inner.round_state, RoundState::Preparing);
    inner.round_state = RoundState::Playing;
    inner.cancel_timer();
}

async fn current_song_id(room: &Arc<Room>) -> String {
    room.lock()
        .await
        .current_song
        .as_ref()
        .expect("current song set")
        .id
        .clone()
}

async fn score_of(room: &Arc<Room>, player_id: &str) -> i32 {
    room.lock().await.players[player_id].score
}

#[tokio::test(start_paused = true)]
async fn lobby_flow_deals_board_and_prepares_round_one() {
    let (_state, mut p1, mut p2, room) = setup_two_player_game(40).await;

    let frames = p1.drain();
    let started = find(&frames, "game_started").expect("game_started broadcast");
    assert_eq!(started["payload"]["cards"].as_array().unwrap().len(), 16);
    assert_eq!(started["payload"]["round"], 1);

    let prepare = find(&frames, "prepare_round").expect("prepare_round broadcast");
    assert_eq!(prepare["payload"]["round"], 1);
    let start_time = prepare["payload"]["startTime"].as_u64().unwrap();
    let play_duration = prepare["payload"]["playDuration"].as_u64().unwrap();
    assert!(start_time < 200);
    assert!(play_duration > 0 && play_duration <= 90);
    // The answer key never rides along with the prepare instruction.
    assert!(prepare["payload"].get("songId").is_none());
    assert!(prepare["payload"].get("currentSong").is_none());

    assert!(find(&p2.drain(), "game_started").is_some());

    let inner = room.lock().await;
    assert_eq!(inner.song_pool.len(), 25);
    assert_eq!(inner.round_state, RoundState::Preparing);
}

#[tokio::test(start_paused = true)]
async fn all_ready_starts_countdown_early_without_double_fire() {
    let (_state, mut p1, p2, room) = setup_two_player_game(10).await;
    p1.drain();

    room_service::client_ready(&p1.session).await;
    room_service::client_ready(&p2.session).await;
    sleep(Duration::from_millis(50)).await;

    let frames = p1.drain();
    assert_eq!(count(&frames, "countdown_start"), 1);

    // Ride past both the 5 s prepare timeout and the 4 s countdown: the
    // cancelled timer must not fire a second countdown.
    sleep(Duration::from_secs(10)).await;
    let frames = p1.drain();
    assert_eq!(count(&frames, "countdown_start"), 0);
    assert_eq!(count(&frames, "play_round"), 1);
    assert_eq!(room.lock().await.round_state, RoundState::Playing);
}

#[tokio::test(start_paused = true)]
async fn prepare_timeout_forces_countdown_for_silent_clients() {
    let (_state, mut p1, _p2, room) = setup_two_player_game(10).await;
    p1.drain();

    // Nobody acknowledges; the 5 s timer must move the round along.
    sleep(Duration::from_millis(5_100)).await;
    assert_eq!(count(&p1.drain(), "countdown_start"), 1);

    sleep(Duration::from_secs(4)).await;
    assert_eq!(count(&p1.drain(), "play_round"), 1);
    assert_eq!(room.lock().await.round_state, RoundState::Playing);
}

#[tokio::test(start_paused = true)]
async fn correct_buzz_scores_matches_card_and_ends_round() {
    let (_state, mut p1, mut p2, room) = setup_two_player_game(3).await;
    force_playing(&room).await;
    p1.drain();
    p2.drain();

    let song_id = current_song_id(&room).await;
    room_service::buzz(&p2.session, song_id.clone()).await;

    let frames = p2.drain();
    let end = find(&frames, "round_end").expect("round_end broadcast");
    let reason = end["payload"]["reason"].as_str().unwrap();
    assert!(reason.contains("P2"));
    assert!(reason.contains("correctly"));
    assert_eq!(end["payload"]["showAnswer"], true);
    let matched = end["payload"]["cards"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == song_id.as_str())
        .unwrap();
    assert_eq!(matched["isMatched"], true);

    assert_eq!(score_of(&room, "p2").await, 10);
    assert_eq!(score_of(&room, "p1").await, 0);
    // The answered song leaves the pool.
    assert_eq!(room.lock().await.song_pool.len(), 2);

    // Scoreboard pause, then the next round prepares automatically.
    sleep(Duration::from_millis(3_100)).await;
    let frames = p1.drain();
    let prepare = find(&frames, "prepare_round").expect("next round prepared");
    assert_eq!(prepare["payload"]["round"], 2);
}

#[tokio::test(start_paused = true)]
async fn wrong_buzz_penalises_and_round_times_out() {
    let (_state, mut p1, mut p2, room) = setup_two_player_game(3).await;
    // Real prepare → countdown path so the 90 s round timer is armed.
    room_service::client_ready(&p1.session).await;
    room_service::client_ready(&p2.session).await;
    sleep(Duration::from_millis(4_100)).await;
    assert_eq!(room.lock().await.round_state, RoundState::Playing);
    p1.drain();
    p2.drain();

    room_service::buzz(&p1.session, "not-a-card".into()).await;

    let frames = p1.drain();
    assert!(find(&frames, "wrong_answer").is_some());
    assert!(find(&frames, "round_end").is_none());
    assert_eq!(score_of(&room, "p1").await, -5);
    // The unicast goes only to the offender.
    assert!(find(&p2.drain(), "wrong_answer").is_none());

    // One answer per round: a late correct buzz from P1 changes nothing.
    let song_id = current_song_id(&room).await;
    room_service::buzz(&p1.session, song_id).await;
    assert_eq!(score_of(&room, "p1").await, -5);
    assert!(find(&p1.drain(), "round_end").is_none());

    // P2 stays idle; the 90 s timeout resolves the round. The song was on
    // the board (pool == board here), so the pool keeps it.
    sleep(Duration::from_millis(90_100)).await;
    let frames = p1.drain();
    let end = find(&frames, "round_end").expect("timeout round_end");
    assert_eq!(end["payload"]["reason"], "time up");
    assert_eq!(end["payload"]["showAnswer"], false);
    assert_eq!(room.lock().await.song_pool.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn all_wrong_ends_round_immediately() {
    let (_state, mut p1, mut p2, room) = setup_two_player_game(3).await;
    force_playing(&room).await;
    p1.drain();
    p2.drain();

    room_service::buzz(&p1.session, "wrong-1".into()).await;
    room_service::buzz(&p2.session, "wrong-2".into()).await;

    let frames = p1.drain();
    let end = find(&frames, "round_end").expect("round ends once everyone missed");
    assert_eq!(end["payload"]["showAnswer"], false);
    assert_eq!(score_of(&room, "p1").await, -5);
    assert_eq!(score_of(&room, "p2").await, -5);
}

#[tokio::test(start_paused = true)]
async fn ghost_song_rewards_unanimous_no_song_claims() {
    // Pool (20) strictly larger than the board (16) guarantees ghosts.
    let (_state, mut p1, mut p2, room) = setup_two_player_game(20).await;
    {
        let mut inner = room.lock().await;
        let ghost_idx = inner
            .song_pool
            .iter()
            .position(|s| inner.board_cards.iter().all(|c| c.id != s.id))
            .expect("pool larger than board");
        inner.current_song = Some(inner.song_pool[ghost_idx].clone());
        inner.current_song_index = ghost_idx;
        inner.round_state = RoundState::Playing;
        inner.cancel_timer();
        assert!(!inner.song_on_board());
    }
    p1.drain();
    p2.drain();

    room_service::no_song(&p1.session).await;
    assert!(find(&p1.drain(), "round_end").is_none());

    room_service::no_song(&p2.session).await;
    let frames = p2.drain();
    let end = find(&frames, "round_end").expect("round ends after unanimous claim");
    assert!(end["payload"]["reason"].as_str().unwrap().contains("ghost song"));
    assert_eq!(end["payload"]["showAnswer"], false);

    assert_eq!(score_of(&room, "p1").await, 5);
    assert_eq!(score_of(&room, "p2").await, 5);
    // The ghost is spent even though no card was matched.
    assert_eq!(room.lock().await.song_pool.len(), 19);
}

#[tokio::test(start_paused = true)]
async fn wrong_no_song_claim_penalises_but_round_continues() {
    let (_state, mut p1, mut p2, room) = setup_two_player_game(3).await;
    force_playing(&room).await;
    p1.drain();
    p2.drain();

    // Pool == board here, so the song is always on the board.
    room_service::no_song(&p1.session).await;
    assert!(find(&p1.drain(), "wrong_answer").is_some());
    assert_eq!(score_of(&room, "p1").await, -5);

    // P2 can still win the round.
    let song_id = current_song_id(&room).await;
    room_service::buzz(&p2.session, song_id).await;
    let frames = p2.drain();
    assert_eq!(
        find(&frames, "round_end").unwrap()["payload"]["showAnswer"],
        true
    );
    assert_eq!(score_of(&room, "p2").await, 10);
}

#[tokio::test(start_paused = true)]
async fn late_joiner_gets_snapshot_and_may_buzz() {
    let (state, mut p1, _p2, room) = setup_two_player_game(3).await;
    force_playing(&room).await;
    p1.drain();

    let mut p3 = TestClient::new();
    join(&state, &mut p3, &room.id, "P3", "p3").await;

    let frames = p3.drain();
    let snapshot = find(&frames, "game_started").expect("private snapshot for the joiner");
    assert_eq!(snapshot["payload"]["round"], 1);
    assert_eq!(snapshot["payload"]["cards"].as_array().unwrap().len(), 3);

    let song_id = current_song_id(&room).await;
    room_service::buzz(&p3.session, song_id).await;
    assert_eq!(score_of(&room, "p3").await, 10);
    assert!(find(&p3.drain(), "round_end").is_some());
}

#[tokio::test(start_paused = true)]
async fn owner_leave_transfers_to_earliest_arrival_then_room_dies() {
    let state = state_with_songs(5);
    let mut p1 = TestClient::new();
    let mut p2 = TestClient::new();
    let mut p3 = TestClient::new();
    let room_id = create_room(&state, &mut p1, "P1", "p1").await;
    join(&state, &mut p2, &room_id, "P2", "p2").await;
    join(&state, &mut p3, &room_id, "P3", "p3").await;
    let room = p2.session.room.clone().unwrap();
    p2.drain();

    room_service::disconnect(&state, &mut p1.session).await;
    assert_eq!(room.lock().await.owner_id, "p2");
    let frames = p2.drain();
    let update = find(&frames, "room_state_update").expect("state after owner left");
    assert_eq!(update["payload"]["ownerId"], "p2");
    assert_eq!(update["payload"]["players"].as_array().unwrap().len(), 2);

    room_service::disconnect(&state, &mut p2.session).await;
    room_service::disconnect(&state, &mut p3.session).await;
    assert!(state.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn emptied_room_cancels_timers_and_leaves_registry() {
    let (state, mut p1, mut p2, room) = setup_two_player_game(5).await;

    room_service::disconnect(&state, &mut p1.session).await;
    room_service::disconnect(&state, &mut p2.session).await;
    assert!(state.registry().is_empty());
    assert_eq!(room.lock().await.round_state, RoundState::Ended);

    // Ride far past every armed timer; nothing may resurrect the round.
    sleep(Duration::from_secs(180)).await;
    assert!(state.registry().is_empty());
    assert_eq!(room.lock().await.round_state, RoundState::Ended);
}

#[tokio::test(start_paused = true)]
async fn cleared_board_finishes_game_and_restart_resets_scores() {
    let (_state, mut p1, mut p2, room) = setup_two_player_game(1).await;
    force_playing(&room).await;
    p1.drain();
    p2.drain();

    let song_id = current_song_id(&room).await;
    room_service::buzz(&p1.session, song_id).await;
    assert_eq!(score_of(&room, "p1").await, 10);

    sleep(Duration::from_millis(3_100)).await;
    let frames = p1.drain();
    let over = find(&frames, "game_over").expect("terminal scoreboard");
    assert_eq!(over["payload"]["players"].as_array().unwrap().len(), 2);
    assert!(room.lock().await.game_over);

    // Only the owner may restart.
    room_service::restart_game(&p2.session).await;
    assert!(room.lock().await.game_over);

    room_service::restart_game(&p1.session).await;
    let frames = p1.drain();
    assert!(find(&frames, "game_reset").is_some());
    let inner = room.lock().await;
    assert_eq!(inner.state, RoomState::Waiting);
    assert!(!inner.game_over);
    assert_eq!(inner.players["p1"].score, 0);
    assert!(inner.board_cards.is_empty());
}

#[tokio::test(start_paused = true)]
async fn join_rejections_surface_error_frames() {
    let state = state_with_songs(5);

    let mut stranger = TestClient::new();
    join(&state, &mut stranger, "0000", "Nobody", "p0").await;
    let frames = stranger.drain();
    assert_eq!(
        find(&frames, "error").unwrap()["payload"]["message"],
        "room not found"
    );
    assert!(stranger.session.room.is_none());

    let mut p1 = TestClient::new();
    let room_id = create_room(&state, &mut p1, "P1", "p1").await;

    let mut clash = TestClient::new();
    join(&state, &mut clash, &room_id, "P1", "p9").await;
    let frames = clash.drain();
    assert_eq!(
        find(&frames, "error").unwrap()["payload"]["message"],
        "name already taken in this room"
    );

    let mut others = Vec::new();
    for i in 2..=4 {
        let mut c = TestClient::new();
        join(&state, &mut c, &room_id, &format!("P{i}"), &format!("p{i}")).await;
        others.push(c);
    }
    let mut fifth = TestClient::new();
    join(&state, &mut fifth, &room_id, "P5", "p5").await;
    let frames = fifth.drain();
    assert!(
        find(&frames, "error").unwrap()["payload"]["message"]
            .as_str()
            .unwrap()
            .contains("room full")
    );
    assert_eq!(room_size(&state, &room_id).await, 4);
}

async fn room_size(state: &SharedState, room_id: &str) -> usize {
    state
        .registry()
        .get(room_id)
        .unwrap()
        .lock()
        .await
        .players
        .len()
}

#[tokio::test(start_paused = true)]
async fn chat_fans_out_with_sender_name() {
    let state = state_with_songs(5);
    let mut p1 = TestClient::new();
    let mut p2 = TestClient::new();
    let room_id = create_room(&state, &mut p1, "P1", "p1").await;
    join(&state, &mut p2, &room_id, "P2", "p2").await;
    p1.drain();

    room_service::chat(&p2.session, "konnichiwa".into()).await;
    let frames = p1.drain();
    let chat = find(&frames, "chat_receive").expect("chat fan-out");
    assert_eq!(chat["payload"]["sender"], "P2");
    assert_eq!(chat["payload"]["text"], "konnichiwa");
}

//! Per-client socket lifecycle: reader loop, writer task, dispatch, cleanup.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    dto::ws::ClientMessage,
    services::room_service::{self, ClientSession},
    state::SharedState,
};

/// Handle the full lifecycle of one client connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing even while we
    // await inbound ones; room broadcasts only ever touch the channel.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut session = ClientSession::default();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(msg) => dispatch(&state, &mut session, &outbound_tx, msg).await,
                Err(err) => debug!(error = %err, "dropping malformed frame"),
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "websocket receive error");
                break;
            }
        }
    }

    // A dropped client is a leave; the room sees no difference.
    room_service::disconnect(&state, &mut session).await;

    drop(outbound_tx);
    let _ = writer_task.await;
}

async fn dispatch(
    state: &SharedState,
    session: &mut ClientSession,
    tx: &mpsc::UnboundedSender<Message>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::CreateRoom {
            player_name,
            player_id,
        } => room_service::create_room(state, session, tx, player_name, player_id).await,
        ClientMessage::JoinRoom {
            room_id,
            player_name,
            player_id,
        } => room_service::join_room(state, session, tx, room_id, player_name, player_id).await,
        ClientMessage::ToggleReady {} => room_service::toggle_ready(session).await,
        ClientMessage::StartGame {} => room_service::start_game(state, session).await,
        ClientMessage::RestartGame {} => room_service::restart_game(session).await,
        ClientMessage::ClientReady {} => room_service::client_ready(session).await,
        ClientMessage::Buzz { card_id } => room_service::buzz(session, card_id).await,
        ClientMessage::NoSong {} => room_service::no_song(session).await,
        ClientMessage::Chat { text } => room_service::chat(session, text).await,
        // Keepalive; the transport-level ping is answered in the read loop.
        ClientMessage::Ping {} => {}
        ClientMessage::Unknown => debug!("dropping frame with unknown type"),
    }
}

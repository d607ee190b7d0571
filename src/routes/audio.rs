use std::path::{Path, PathBuf};

use axum::{
    Router,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{error::AppError, state::SharedState};

/// Known asset extensions and their content types, probed in order.
const AUDIO_EXTENSIONS: &[(&str, &str)] = &[
    ("m4a", "audio/mp4"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioQuery {
    room_id: String,
    /// Cache-busting nonce sent by clients; opaque and unvalidated.
    #[serde(default)]
    #[allow(dead_code)]
    t: Option<String>,
}

#[utoipa::path(
    get,
    path = "/audio",
    tag = "audio",
    params(
        ("roomId" = String, Query, description = "Room whose current song to stream"),
        ("t" = Option<String>, Query, description = "Opaque cache-busting nonce"),
    ),
    responses(
        (status = 200, description = "Current song bytes, uncacheable"),
        (status = 404, description = "Room missing or no active round"),
    )
)]
/// Stream the current song for an active round.
///
/// This is the only place the answer leaves the server, so it refuses
/// anything outside an active round and forbids caching of the response.
pub async fn audio(
    State(state): State<SharedState>,
    Query(query): Query<AudioQuery>,
) -> Result<Response, AppError> {
    let room = state
        .registry()
        .get(&query.room_id)
        .ok_or_else(|| AppError::NotFound("room not found".into()))?;

    let song_id = {
        let inner = room.lock().await;
        if !inner.round_active() {
            return Err(AppError::NotFound("no active round".into()));
        }
        match &inner.current_song {
            Some(song) => song.id.clone(),
            None => return Err(AppError::NotFound("no current song".into())),
        }
    };

    let (path, content_type) = resolve_asset(state.config().audio_dir(), &song_id)
        .await
        .ok_or_else(|| {
            warn!(song = %song_id, "audio asset missing on disk");
            AppError::NotFound("audio asset not found".into())
        })?;

    debug!(room = %query.room_id, path = %path.display(), "serving audio asset");
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|err| AppError::Internal(format!("failed to read audio asset: {err}")))?;

    Ok((
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::CONTENT_TYPE, content_type),
        ],
        bytes,
    )
        .into_response())
}

/// Find `<song_id>.<ext>` under the asset directory.
async fn resolve_asset(dir: &Path, song_id: &str) -> Option<(PathBuf, &'static str)> {
    for &(ext, content_type) in AUDIO_EXTENSIONS {
        let candidate = dir.join(format!("{song_id}.{ext}"));
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some((candidate, content_type));
        }
    }
    None
}

/// Configure the audio gate route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/audio", get(audio))
}

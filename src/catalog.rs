//! Song catalogue loaded once at startup and shared read-only afterwards.

use std::{fs, io::ErrorKind, path::Path};

use serde::Deserialize;
use tracing::{info, warn};

/// One entry of the song catalogue. `id` names the audio asset on disk;
/// `duration` is the full track length in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct Song {
    pub id: String,
    pub title_original: String,
    pub title_translation: String,
    pub duration: u32,
}

/// Immutable catalogue of songs available to every room.
#[derive(Debug, Clone, Default)]
pub struct SongCatalog {
    songs: Vec<Song>,
}

impl SongCatalog {
    /// Load the catalogue from a JSON array on disk.
    ///
    /// A missing or unreadable file yields an empty catalogue: rooms can
    /// still be created and the health endpoint reports degraded.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Vec<Song>>(&contents) {
                Ok(songs) => {
                    info!(path = %path.display(), count = songs.len(), "loaded song catalogue");
                    Self { songs }
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse song catalogue; starting with no songs"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "song catalogue not found; starting with no songs"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read song catalogue; starting with no songs"
                );
                Self::default()
            }
        }
    }

    /// Build a catalogue from an in-memory list.
    pub fn from_songs(songs: Vec<Song>) -> Self {
        Self { songs }
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

//! Application-level configuration resolved from the environment.

use std::{env, path::PathBuf};

/// Environment variable overriding the song catalogue location.
const SONGS_PATH_ENV: &str = "KARUTA_SONGS_PATH";
/// Environment variable overriding the audio asset directory.
const AUDIO_DIR_ENV: &str = "KARUTA_AUDIO_DIR";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SONGS_PATH: &str = "data/songs.json";
const DEFAULT_AUDIO_DIR: &str = "audio";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    port: u16,
    songs_path: PathBuf,
    audio_dir: PathBuf,
}

impl AppConfig {
    /// Resolve the configuration from environment variables, falling back to
    /// the defaults used by the packaged deployment.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let songs_path = env::var(SONGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| DEFAULT_SONGS_PATH.into());
        let audio_dir = env::var(AUDIO_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| DEFAULT_AUDIO_DIR.into());

        Self {
            port,
            songs_path,
            audio_dir,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn songs_path(&self) -> &PathBuf {
        &self.songs_path
    }

    pub fn audio_dir(&self) -> &PathBuf {
        &self.audio_dir
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            songs_path: DEFAULT_SONGS_PATH.into(),
            audio_dir: DEFAULT_AUDIO_DIR.into(),
        }
    }
}

use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of live rooms.
    pub rooms: usize,
    /// Number of catalogue songs available for new games.
    pub songs: usize,
}

impl HealthResponse {
    /// Health response for a server with a usable song catalogue.
    pub fn ok(rooms: usize, songs: usize) -> Self {
        Self {
            status: "ok".to_string(),
            rooms,
            songs,
        }
    }

    /// Health response for a server that started without songs.
    pub fn degraded(rooms: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            rooms,
            songs: 0,
        }
    }
}

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report catalogue availability and the live room count. A server that
/// started without songs still referees chat-only lobbies, hence degraded
/// rather than dead.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let rooms = state.registry().len();
    if state.catalog().is_empty() {
        HealthResponse::degraded(rooms)
    } else {
        HealthResponse::ok(rooms, state.catalog().len())
    }
}

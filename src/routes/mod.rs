use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod audio;
pub mod health;
pub mod websocket;

/// Assemble the referee's full route surface: game WebSocket, audio gate,
/// health check, and the Swagger UI describing the HTTP endpoints.
pub fn router(state: SharedState) -> Router<()> {
    let swagger = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    health::router()
        .merge(websocket::router())
        .merge(audio::router())
        .with_state(state)
        .merge(swagger)
}

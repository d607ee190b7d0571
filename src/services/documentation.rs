use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the karuta referee server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::audio::audio,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::game::PlayerView,
            crate::dto::game::CardView,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "audio", description = "Round-scoped audio asset gate"),
        (name = "game", description = "WebSocket operations for game clients"),
    )
)]
pub struct ApiDoc;

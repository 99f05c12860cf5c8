use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Hub Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::PlayerSummary,
            crate::dto::ws::RoomSummary,
            crate::state::room::QuizQuestion,
            crate::state::room::PlayerStatus,
            crate::state::room::RoomStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "quiz", description = "WebSocket operations for quiz clients"),
    )
)]
pub struct ApiDoc;

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the typerace party server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::get_room,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomsResponse,
            crate::dto::room::RoomDetailResponse,
            crate::dto::room::MirrorSnapshot,
            crate::dto::ws::ReadyValues,
            crate::dto::ws::UpdateNameValues,
            crate::dto::ws::FinishedValues,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Read-only room inspection"),
        (name = "players", description = "WebSocket operations for players"),
    )
)]
pub struct ApiDoc;

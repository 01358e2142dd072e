use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tracing::warn;

use crate::{
    dto::validation::validate_room_id, error::AppError, services::websocket_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/ws",
    tag = "players",
    params(("room_id" = String, Path, description = "Room to join")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Invalid room id")
    )
)]
/// Upgrade the HTTP connection into a player WebSocket session for `room_id`.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    if let Err(err) = validate_room_id(&room_id) {
        warn!(room_id = %room_id, error = %err, "rejecting websocket upgrade");
        return Err(AppError::BadRequest(err.to_string()));
    }

    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(state, room_id, socket)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{room_id}/ws", get(ws_handler))
}

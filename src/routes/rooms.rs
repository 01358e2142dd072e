use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::room::{RoomDetailResponse, RoomsResponse},
    error::AppError,
    services::rooms_service,
    state::SharedState,
};

/// Read-only endpoints that expose the live rooms.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/{room_id}", get(get_room))
}

#[utoipa::path(
    get,
    path = "/api/rooms",
    tag = "rooms",
    responses((status = 200, description = "Live rooms", body = RoomsResponse))
)]
/// Return a summary of every live room.
pub async fn list_rooms(State(state): State<SharedState>) -> Result<Json<RoomsResponse>, AppError> {
    let payload = rooms_service::list_rooms(&state).await?;
    Ok(Json(payload))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room detail", body = RoomDetailResponse),
        (status = 400, description = "Invalid room id"),
        (status = 404, description = "Unknown room"),
        (status = 503, description = "Room did not answer in time")
    )
)]
/// Return the summary and current snapshot of a room.
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailResponse>, AppError> {
    let payload = rooms_service::get_room(&state, &room_id).await?;
    Ok(Json(payload))
}

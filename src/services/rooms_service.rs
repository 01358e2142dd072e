//! Service helpers that expose read-only projections of the live rooms.

use std::time::Duration;

use tokio::{sync::oneshot, time::timeout};

use crate::{
    dto::{
        room::{RoomDetailResponse, RoomSummary, RoomsResponse},
        validation::validate_room_id,
    },
    error::ServiceError,
    services::room_service::RoomCommand,
    state::{RoomHandle, SharedState},
};

/// How long a room task gets to answer a describe request.
const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Return a summary of every live room, ordered by room id.
pub async fn list_rooms(state: &SharedState) -> Result<RoomsResponse, ServiceError> {
    let handles: Vec<RoomHandle> = state
        .rooms()
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    let mut rooms: Vec<RoomSummary> = Vec::with_capacity(handles.len());
    for handle in handles {
        match describe(&handle).await {
            Ok(detail) => rooms.push(detail.room),
            // The room retired between the listing and the request.
            Err(ServiceError::NotFound(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    rooms.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(RoomsResponse { rooms })
}

/// Return the summary and current snapshot of `room_id`.
pub async fn get_room(
    state: &SharedState,
    room_id: &str,
) -> Result<RoomDetailResponse, ServiceError> {
    validate_room_id(room_id).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let handle = state
        .room(room_id)
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))?;

    describe(&handle).await
}

async fn describe(handle: &RoomHandle) -> Result<RoomDetailResponse, ServiceError> {
    let not_found = || ServiceError::NotFound(format!("room `{}` not found", handle.room_id()));

    let (reply, response) = oneshot::channel();
    if !handle.send(RoomCommand::Describe { reply }) {
        return Err(not_found());
    }

    match timeout(DESCRIBE_TIMEOUT, response).await {
        Ok(Ok(detail)) => Ok(detail),
        Ok(Err(_)) => Err(not_found()),
        Err(_) => Err(ServiceError::Timeout),
    }
}

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::RoomPhase;

/// Room phase as exposed to clients (WebSocket and REST).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleRoomPhase {
    /// Players are readying up.
    Lobby,
    /// A race is in progress.
    Running,
    /// Final scores are displayed.
    Ending,
}

impl From<RoomPhase> for VisibleRoomPhase {
    fn from(value: RoomPhase) -> Self {
        match value {
            RoomPhase::Lobby => VisibleRoomPhase::Lobby,
            RoomPhase::Running => VisibleRoomPhase::Running,
            RoomPhase::Ending => VisibleRoomPhase::Ending,
        }
    }
}

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::phase::VisibleRoomPhase,
    state::room::{FinishedResult, Player},
};

/// Player as seen by every client of the room.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Opaque connection identifier.
    pub connection_id: String,
    /// Display name (may be empty).
    pub name: String,
    /// Score of the last completed race.
    pub score: i64,
    /// Ready-up flag.
    pub is_ready: bool,
}

impl From<&Player> for PlayerView {
    fn from(value: &Player) -> Self {
        Self {
            connection_id: value.connection_id.clone(),
            name: value.name.clone(),
            score: value.score,
            is_ready: value.is_ready,
        }
    }
}

/// One reported race result, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishedResultView {
    /// Connection that reported the result.
    pub connection_id: String,
    /// Reported result.
    pub result: f64,
}

impl From<&FinishedResult> for FinishedResultView {
    fn from(value: &FinishedResult) -> Self {
        Self {
            connection_id: value.connection_id.clone(),
            result: value.result,
        }
    }
}

/// Phase-dependent projection of a room broadcast to every connection.
///
/// Lobby and Ending carry `phase` and `players`; Running adds the target text and the
/// results reported so far.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSnapshot {
    /// Current phase.
    pub phase: VisibleRoomPhase,
    /// Players in join order.
    pub players: Vec<PlayerView>,
    /// Text to type (Running only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_text: Option<String>,
    /// Reported results (Running only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_results: Option<Vec<FinishedResultView>>,
}

/// Short description of a live room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummary {
    /// Room identifier.
    pub id: String,
    /// Current phase.
    pub phase: VisibleRoomPhase,
    /// Number of players in the room.
    pub player_count: usize,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// Response listing every live room.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomsResponse {
    /// Live rooms.
    pub rooms: Vec<RoomSummary>,
}

/// Detailed view of a single room.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomDetailResponse {
    /// Summary of the room.
    pub room: RoomSummary,
    /// Snapshot the clients currently see.
    pub mirror: MirrorSnapshot,
}

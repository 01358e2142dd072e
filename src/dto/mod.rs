use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Health check payloads.
pub mod health;
/// Phase as exposed to clients.
pub mod phase;
/// Room snapshots and REST payloads.
pub mod room;
/// Input validation helpers.
pub mod validation;
/// WebSocket wire messages.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

impl room::RoomSummary {
    /// Build a summary from the live room facts.
    pub fn new(
        id: String,
        phase: phase::VisibleRoomPhase,
        player_count: usize,
        created_at: SystemTime,
    ) -> Self {
        Self {
            id,
            phase,
            player_count,
            created_at: format_system_time(created_at),
        }
    }
}

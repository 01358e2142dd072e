use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload alongside the number of live rooms.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let rooms = state.rooms().len();
    debug!(rooms, "health check");
    HealthResponse::ok(rooms)
}

use tracing::debug;

use crate::{dto::health::HealthResponse, state::AppState};

/// Report liveness together with the instance identity and its room count.
pub fn health_status(state: &AppState) -> HealthResponse {
    let rooms = state.rooms().len();
    debug!(instance = state.instance_id(), rooms, "health check");
    HealthResponse::ok(state.instance_id(), rooms)
}

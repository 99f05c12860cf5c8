use crate::{dto::health::HealthResponse, state::SharedState};

/// Snapshot the coordinator's health counters.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        rooms: state.catalog().room_count(),
        connections: state.connections().len(),
    }
}

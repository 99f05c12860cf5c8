use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status (always "ok"; the coordinator has no external backend).
    pub status: String,
    /// Rooms currently tracked by the catalog.
    pub rooms: usize,
    /// Live client connections.
    pub connections: usize,
}

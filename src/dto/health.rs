use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the process serves requests.
    pub status: String,
    /// Identifier of the answering instance.
    pub instance: String,
    /// Number of rooms held in memory.
    pub rooms: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(instance: impl Into<String>, rooms: usize) -> Self {
        Self {
            status: "ok".to_string(),
            instance: instance.into(),
            rooms,
        }
    }
}
